// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! A generic hierarchical state machine.
//!
//! A [`StateTree`] is a fixed tree of named states, built once and then only read. Each node may
//! register an action per event kind plus optional enter and exit actions. An event that a state
//! does not handle bubbles up to the closest ancestor that does.
//!
//! The tree stores no behaviour itself: actions are plain tags (usually a `Copy` enum) which the
//! owner of the tree maps onto code. States are identified by a `Copy` id, so anything that is
//! "in" a state only needs to hold that id.

use crate::util::errors::StateTreeError;

use alloc::collections::VecDeque;

/// A state identifier which can be stored in a [`StateTree`].
pub trait StateId: Copy + Eq {
	/// The name of the state. Names are unique within one tree.
	fn name(&self) -> &'static str;
}

struct StateNode<S, E, A> {
	id: S,
	parent: Option<usize>,
	children: Vec<usize>,
	handlers: Vec<(E, A)>,
	on_enter: Option<A>,
	on_exit: Option<A>,
	persist: bool,
}

/// A tree of states stored in an arena, with the root at index 0.
pub struct StateTree<S: StateId, E, A> {
	nodes: Vec<StateNode<S, E, A>>,
}

impl<S: StateId, E: Copy + Eq, A: Copy> StateTree<S, E, A> {
	/// Creates a tree holding only `root`.
	pub fn new(root: S) -> Self {
		StateTree { nodes: vec![Self::node(root, None)] }
	}

	fn node(id: S, parent: Option<usize>) -> StateNode<S, E, A> {
		StateNode {
			id,
			parent,
			children: Vec::new(),
			handlers: Vec::new(),
			on_enter: None,
			on_exit: None,
			persist: true,
		}
	}

	fn index_of(&self, state: S) -> Option<usize> {
		self.nodes.iter().position(|node| node.id == state)
	}

	fn node_mut(&mut self, state: S) -> Result<&mut StateNode<S, E, A>, StateTreeError> {
		match self.index_of(state) {
			Some(idx) => Ok(&mut self.nodes[idx]),
			None => Err(StateTreeError::UnknownParent(state.name())),
		}
	}

	/// The root state.
	pub fn root(&self) -> S {
		self.nodes[0].id
	}

	/// Attaches `child` beneath `parent`.
	///
	/// Fails if `parent` is not in the tree or if any state, anywhere in the tree, already has
	/// `child`'s name.
	pub fn add_sub_state(&mut self, parent: S, child: S) -> Result<&mut Self, StateTreeError> {
		if self.nodes.iter().any(|node| node.id.name() == child.name()) {
			return Err(StateTreeError::DuplicateState(child.name()));
		}
		let parent_idx =
			self.index_of(parent).ok_or(StateTreeError::UnknownParent(parent.name()))?;
		let child_idx = self.nodes.len();
		self.nodes.push(Self::node(child, Some(parent_idx)));
		self.nodes[parent_idx].children.push(child_idx);
		Ok(self)
	}

	/// Registers `action` as the handler of `event` in `state`. A later registration for the same
	/// event replaces the earlier one.
	pub fn on(&mut self, state: S, event: E, action: A) -> Result<&mut Self, StateTreeError> {
		let node = self.node_mut(state)?;
		match node.handlers.iter_mut().find(|(e, _)| *e == event) {
			Some(handler) => handler.1 = action,
			None => node.handlers.push((event, action)),
		}
		Ok(self)
	}

	/// Registers the action run when a transition enters `state`.
	pub fn on_enter(&mut self, state: S, action: A) -> Result<&mut Self, StateTreeError> {
		self.node_mut(state)?.on_enter = Some(action);
		Ok(self)
	}

	/// Registers the action run when a transition leaves `state`.
	pub fn on_exit(&mut self, state: S, action: A) -> Result<&mut Self, StateTreeError> {
		self.node_mut(state)?.on_exit = Some(action);
		Ok(self)
	}

	/// Sets whether entering `state` should be persisted. States persist by default.
	pub fn set_persist(&mut self, state: S, persist: bool) -> Result<&mut Self, StateTreeError> {
		self.node_mut(state)?.persist = persist;
		Ok(self)
	}

	/// Breadth-first search of the whole tree for the state called `name`.
	pub fn find_state(&self, name: &str) -> Option<S> {
		let mut queue = VecDeque::new();
		queue.push_back(0);
		while let Some(idx) = queue.pop_front() {
			let node = &self.nodes[idx];
			if node.id.name() == name {
				return Some(node.id);
			}
			queue.extend(node.children.iter().copied());
		}
		None
	}

	/// Looks up the handler for `event` in `state`, walking up through its ancestors until one
	/// handles it. Returns the state that owns the handler along with the action, or `None` if
	/// nothing up to and including the root handles the event.
	pub fn handler_for(&self, state: S, event: E) -> Option<(S, A)> {
		let mut idx = self.index_of(state);
		while let Some(i) = idx {
			let node = &self.nodes[i];
			if let Some((_, action)) = node.handlers.iter().find(|(e, _)| *e == event) {
				return Some((node.id, *action));
			}
			idx = node.parent;
		}
		None
	}

	/// The enter action of `state`, if any.
	pub fn enter_action(&self, state: S) -> Option<A> {
		self.index_of(state).and_then(|idx| self.nodes[idx].on_enter)
	}

	/// The exit action of `state`, if any.
	pub fn exit_action(&self, state: S) -> Option<A> {
		self.index_of(state).and_then(|idx| self.nodes[idx].on_exit)
	}

	/// Whether entering `state` should be persisted. Unknown states do not persist.
	pub fn persists(&self, state: S) -> bool {
		self.index_of(state).map(|idx| self.nodes[idx].persist).unwrap_or(false)
	}

	/// The parent of `state`, or `None` for the root and for unknown states.
	pub fn parent(&self, state: S) -> Option<S> {
		self.index_of(state).and_then(|idx| self.nodes[idx].parent).map(|p| self.nodes[p].id)
	}

	/// The number of states in the tree.
	pub fn len(&self) -> usize {
		self.nodes.len()
	}
}
