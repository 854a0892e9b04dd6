//! Buffer start address resolution.
//!
//! There is no reliable way to ask three unrelated debug adapters for "the
//! data pointer of this container", so resolution is a search over strategies:
//! first the variable children the adapter has already expanded are walked
//! looking for well-known standard library storage members, then the
//! backend candidate expressions are evaluated one by one. The first valid
//! address wins.

pub mod parse;

use crate::address::Address;
use crate::backend::Shape;
use crate::config::AcquireConfig;
use crate::error::Error;
use crate::session::{ChildVariable, Session, VariableDescriptor};
use crate::weak_error;
use log::{debug, info};

/// Members holding the first element (or a pointer to it) in libstdc++, libc++ and MSVC STL.
pub const STORAGE_MEMBERS: &[&str] = &[
    "_M_start", "_M_elems", "__begin_", "__elems_", "_Myfirst", "_Elems",
];

/// Intermediate members wrapping the storage members.
const WRAPPER_MEMBERS: &[&str] = &["_M_impl", "_Mypair", "_Myval2", "__value_"];

/// Positional name adapters give to the first element of an expanded container.
const FIRST_ELEMENT: &str = "[0]";

/// How an address was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    MemberWalk,
    Expression(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub address: Address,
    pub strategy: Strategy,
}

pub struct Resolver<'a> {
    session: &'a Session,
    config: &'a AcquireConfig,
}

impl<'a> Resolver<'a> {
    pub fn new(session: &'a Session, config: &'a AcquireConfig) -> Self {
        Self { session, config }
    }

    /// Find the start of contiguous storage of a variable. Return [`None`] if
    /// no strategy produced a valid address.
    pub fn resolve(&self, descriptor: &VariableDescriptor, shape: Shape) -> Option<Resolved> {
        if let Some(children_ref) = descriptor.children_reference {
            if let Some(address) = self.walk_members(children_ref, shape) {
                debug!(target: "resolve", "`{}` resolved by member walk: {address}", descriptor.name);
                return Some(Resolved {
                    address,
                    strategy: Strategy::MemberWalk,
                });
            }
        }

        if let Some((idx, address)) = self.evaluate_candidates(descriptor, shape) {
            debug!(target: "resolve", "`{}` resolved by candidate #{idx}: {address}", descriptor.name);
            return Some(Resolved {
                address,
                strategy: Strategy::Expression(idx),
            });
        }

        info!(
            target: "resolve",
            "no address for `{}` ({}) on {} backend",
            descriptor.name, descriptor.declared_type, self.session.backend()
        );
        None
    }

    fn walk_members(&self, children_ref: i64, shape: Shape) -> Option<Address> {
        let mut budget = self.config.max_resolve_depth.max(shape.dims());
        self.walk_level(children_ref, shape.dims(), &mut budget)
    }

    /// Search one level of children. `dims` is the number of container levels
    /// left before reaching an element, `budget` caps the number of expansions.
    fn walk_level(&self, children_ref: i64, dims: usize, budget: &mut usize) -> Option<Address> {
        if *budget == 0 {
            return None;
        }
        *budget -= 1;

        let children = weak_error!(
            "resolve",
            self.session
                .list_children(children_ref, self.config.eval_timeout()),
            "list children:"
        )?;

        if dims == 1 {
            if let Some(address) = storage_member_address(&children) {
                return Some(address);
            }
        }

        if let Some(first) = children.iter().find(|c| c.name == FIRST_ELEMENT) {
            if dims == 1 {
                if let Some(address) = parse::memory_reference(first.memory_reference.as_deref()) {
                    return Some(address);
                }
            } else if let Some(row_ref) = first.children_reference.filter(|r| *r > 0) {
                if let Some(address) = self.walk_level(row_ref, dims - 1, budget) {
                    return Some(address);
                }
            }
        }

        children
            .iter()
            .filter(|c| is_wrapper(&c.name))
            .filter_map(|c| c.children_reference.filter(|r| *r > 0))
            .find_map(|wrapper_ref| self.walk_level(wrapper_ref, dims, budget))
    }

    /// Evaluate backend candidates strictly one after another.
    fn evaluate_candidates(
        &self,
        descriptor: &VariableDescriptor,
        shape: Shape,
    ) -> Option<(usize, Address)> {
        let candidates = self.session.profile().candidates(shape, &descriptor.name);
        for (idx, expression) in candidates.iter().enumerate() {
            let Ok(response) = self
                .session
                .evaluate(expression, descriptor.frame_id, self.config.eval_timeout())
                .map_err(|e| debug!(target: "resolve", "candidate `{expression}` failed: {e:#}"))
            else {
                continue;
            };

            let address = parse::address_in_text(&response.result)
                .or_else(|| parse::memory_reference(response.memory_reference.as_deref()));
            match address {
                Some(address) => return Some((idx, address)),
                None => {
                    debug!(target: "resolve", "candidate `{expression}` gave no address: {}", response.result)
                }
            }
        }
        None
    }
}

/// Resolve the start address of a variable storage.
pub fn resolve(
    session: &Session,
    descriptor: &VariableDescriptor,
    shape: Shape,
    config: &AcquireConfig,
) -> Option<Address> {
    Resolver::new(session, config)
        .resolve(descriptor, shape)
        .map(|r| r.address)
}

/// Evaluate an integer valued expression, like a container size.
pub fn evaluate_count(
    session: &Session,
    expression: &str,
    frame_id: Option<i64>,
    config: &AcquireConfig,
) -> Result<u64, Error> {
    let expression = format!("{}{expression}", session.profile().dialect.prefix);
    let response = session.evaluate(&expression, frame_id, config.eval_timeout())?;
    parse::integer_in_text(&response.result).ok_or(Error::NotAnInteger(response.result))
}

fn is_wrapper(name: &str) -> bool {
    WRAPPER_MEMBERS.contains(&name) || name.starts_with("std::")
}

fn storage_member_address(children: &[ChildVariable]) -> Option<Address> {
    children
        .iter()
        .filter(|c| STORAGE_MEMBERS.contains(&c.name.as_str()))
        .find_map(|c| {
            parse::memory_reference(c.memory_reference.as_deref())
                .or_else(|| parse::address_in_text(&c.value))
        })
}
