use crate::common::{child, config, expandable, session, FakeDebugee};
use memviz::resolve::{evaluate_count, Resolver, Strategy};
use memviz::{Backend, Shape, VariableDescriptor};
use std::sync::Arc;
use std::time::Duration;

fn vector(children: i64) -> VariableDescriptor {
    VariableDescriptor::new("v", "std::vector<float>").with_children(children)
}

#[test]
fn test_storage_member_skips_evaluation() {
    let debugee = Arc::new(FakeDebugee::default());
    debugee.script_children(
        1,
        vec![
            child("_M_finish", "0x9100", None),
            child("_M_start", "0x9000", Some("0x9000")),
        ],
    );
    let session = session(&debugee, Backend::CppDbg);
    let config = config(16, 2);

    let resolved = Resolver::new(&session, &config)
        .resolve(&vector(1), Shape::Flat)
        .unwrap();

    assert_eq!(resolved.address.as_u64(), 0x9000);
    assert_eq!(resolved.strategy, Strategy::MemberWalk);
    assert!(debugee.evaluated().is_empty());
    assert_eq!(*debugee.list_log.lock().unwrap(), vec![1]);
}

#[test]
fn test_member_walk_preferred() {
    let debugee = Arc::new(FakeDebugee::default());
    debugee.script_children(1, vec![child("_Myfirst", "0xa000 {1.0}", None)]);
    debugee.script_eval("v._Mypair._Myval2._Myfirst", "0xb000 {1.0}", None);
    let session = session(&debugee, Backend::CppVsDbg);
    let config = config(16, 2);

    let resolved = Resolver::new(&session, &config)
        .resolve(&vector(1), Shape::Flat)
        .unwrap();

    assert_eq!(resolved.address.as_u64(), 0xa000);
    assert!(debugee.evaluated().is_empty());

    // without children reference the expression path is used
    let desc = VariableDescriptor::new("v", "std::vector<float>");
    let resolved = Resolver::new(&session, &config)
        .resolve(&desc, Shape::Flat)
        .unwrap();
    assert_eq!(resolved.address.as_u64(), 0xb000);
    assert_eq!(resolved.strategy, Strategy::Expression(0));
}

#[test]
fn test_candidates_tried_in_order() {
    let debugee = Arc::new(FakeDebugee::default());
    debugee.script_eval("&v[0]", "(float *) 0x0", None);
    debugee.script_eval("v.data()", "(float *) 0x55555556aeb0", None);
    let session = session(&debugee, Backend::CppDbg);
    let config = config(16, 2);

    let desc = VariableDescriptor::new("v", "std::vector<float>");
    let resolved = Resolver::new(&session, &config)
        .resolve(&desc, Shape::Flat)
        .unwrap();

    assert_eq!(resolved.address.as_u64(), 0x55555556aeb0);
    assert_eq!(resolved.strategy, Strategy::Expression(2));
    assert_eq!(
        debugee.evaluated(),
        vec!["v._M_impl._M_start", "&v[0]", "v.data()"]
    );
}

#[test]
fn test_memory_reference_reply() {
    let debugee = Arc::new(FakeDebugee::default());
    debugee.script_eval("&arr._M_elems[0]", "{...}", Some("0x7ffd0000"));
    let session = session(&debugee, Backend::CppDbg);
    let config = config(16, 2);

    let desc = VariableDescriptor::new("arr", "std::array<int, 4>");
    let address = memviz::resolve::resolve(&session, &desc, Shape::FixedArray, &config);

    assert_eq!(address.map(|a| a.as_u64()), Some(0x7ffd0000));
}

#[test]
fn test_not_found() {
    let debugee = Arc::new(FakeDebugee::default());
    debugee.script_eval("&v[0]", "<error: no member named 'operator[]'>", None);
    let session = session(&debugee, Backend::Unknown);
    let config = config(16, 2);

    let desc = VariableDescriptor::new("v", "std::set<int>");
    let resolved = Resolver::new(&session, &config).resolve(&desc, Shape::Flat);

    assert!(resolved.is_none());
    assert_eq!(debugee.evaluated(), vec!["&v[0]", "v.data()"]);
}

#[test]
fn test_matrix_member_walk() {
    let debugee = Arc::new(FakeDebugee::default());
    debugee.script_children(1, vec![expandable("[0]", 2), expandable("[1]", 3)]);
    debugee.script_children(
        2,
        vec![child("[0]", "0.5", Some("0xb000")), child("[1]", "1.5", None)],
    );
    let session = session(&debugee, Backend::CppDbg);
    let config = config(16, 2);

    let desc = VariableDescriptor::new("grid", "std::vector<std::vector<float>>").with_children(1);
    let resolved = Resolver::new(&session, &config)
        .resolve(&desc, Shape::Matrix)
        .unwrap();

    assert_eq!(resolved.address.as_u64(), 0xb000);
    assert_eq!(*debugee.list_log.lock().unwrap(), vec![1, 2]);
}

#[test]
fn test_matrix_walk_ignores_row_storage() {
    // a storage pointer at the outer level points to rows, not elements
    let debugee = Arc::new(FakeDebugee::default());
    debugee.script_children(1, vec![child("_M_start", "0x9000", None)]);
    debugee.script_eval("&grid[0][0]", "(float *) 0xc000", None);
    let session = session(&debugee, Backend::CppDbg);
    let config = config(16, 2);

    let desc = VariableDescriptor::new("grid", "std::vector<std::vector<float>>").with_children(1);
    let address = memviz::resolve::resolve(&session, &desc, Shape::Matrix, &config);

    assert_eq!(address.map(|a| a.as_u64()), Some(0xc000));
}

#[test]
fn test_walk_through_wrappers() {
    let debugee = Arc::new(FakeDebugee::default());
    debugee.script_children(
        1,
        vec![expandable("std::_Vector_base<float, std::allocator<float> >", 5)],
    );
    debugee.script_children(5, vec![expandable("_M_impl", 6)]);
    debugee.script_children(
        6,
        vec![
            child("_M_start", "0x8000", None),
            child("_M_finish", "0x8010", None),
        ],
    );
    let session = session(&debugee, Backend::CppDbg);
    let config = config(16, 2);

    let resolved = Resolver::new(&session, &config)
        .resolve(&vector(1), Shape::Flat)
        .unwrap();

    assert_eq!(resolved.address.as_u64(), 0x8000);
    assert_eq!(*debugee.list_log.lock().unwrap(), vec![1, 5, 6]);
}

#[test]
fn test_wrapper_descent_is_capped() {
    let debugee = Arc::new(FakeDebugee::default());
    debugee.script_children(1, vec![expandable("_M_impl", 5)]);
    debugee.script_children(5, vec![expandable("_Mypair", 6)]);
    debugee.script_children(6, vec![expandable("_Myval2", 7)]);
    debugee.script_children(7, vec![child("_M_start", "0x8000", None)]);
    debugee.script_eval("v._M_impl._M_start", "(float *) 0x9000", None);
    let session = session(&debugee, Backend::CppDbg);
    let config = config(16, 2);

    let resolved = Resolver::new(&session, &config)
        .resolve(&vector(1), Shape::Flat)
        .unwrap();

    // three expansions, then candidates
    assert_eq!(*debugee.list_log.lock().unwrap(), vec![1, 5, 6]);
    assert_eq!(resolved.strategy, Strategy::Expression(0));
    assert_eq!(resolved.address.as_u64(), 0x9000);
}

#[test]
fn test_timeout_is_failed_candidate() {
    let mut debugee = FakeDebugee::default();
    debugee.eval_delay = Duration::from_millis(300);
    let debugee = Arc::new(debugee);
    debugee.script_eval("&v[0]", "(int *) 0x9000", None);
    let session = session(&debugee, Backend::Unknown);
    let mut config = config(16, 2);
    config.eval_timeout_ms = 20;

    let desc = VariableDescriptor::new("v", "std::vector<int>");
    let resolved = Resolver::new(&session, &config).resolve(&desc, Shape::Flat);

    assert!(resolved.is_none());
    assert_eq!(debugee.evaluated().len(), 2);
}

#[test]
fn test_lldb_dialect() {
    let debugee = Arc::new(FakeDebugee::default());
    debugee.script_eval("/nat &v[0]", "(float *) $0 = 0x0000555555570eb0", None);
    let session = session(&debugee, Backend::CodeLldb);
    let config = config(16, 2);

    let desc = VariableDescriptor::new("v", "std::vector<float>");
    let address = memviz::resolve::resolve(&session, &desc, Shape::Flat, &config);

    assert_eq!(address.map(|a| a.as_u64()), Some(0x555555570eb0));
    assert_eq!(
        debugee.evaluated(),
        vec!["/nat v.__begin_", "/nat v._M_impl._M_start", "/nat &v[0]"]
    );
}

#[test]
fn test_evaluate_count() {
    let debugee = Arc::new(FakeDebugee::default());
    debugee.script_eval("/nat v.size()", "(size_t) $1 = 5000", None);
    let session = session(&debugee, Backend::CodeLldb);
    let config = config(16, 2);

    assert_eq!(
        evaluate_count(&session, "v.size()", None, &config).unwrap(),
        5000
    );
    assert!(evaluate_count(&session, "w.size()", None, &config).is_err());
}
