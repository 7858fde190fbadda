use std::error::Error;
use std::fmt;
use std::rc::Rc;

use tracing::warn;

use crate::node::NodeUuid;
use crate::reflect::Variant;

pub type ObserverResult = Result<(), Box<dyn Error>>;

/// In-code subscriber. Never persisted.
pub type Observer = Rc<dyn Fn(&[Variant]) -> ObserverResult>;

/// Persistable subscription: a method of another node, called deferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
	pub target: NodeUuid,
	pub method: String,
}

enum Subscriber {
	Observer(Observer),
	Bound(Binding),
}

#[derive(Debug, thiserror::Error)]
#[error("{} of {total} subscribers failed: {}", .failures.len(), .failures.join("; "))]
pub struct SignalError {
	pub total: usize,
	pub failures: Vec<String>,
}

/// Ordered multi-subscriber notification channel.
///
/// Connecting the same subscriber twice makes it run twice per emission.
#[derive(Default)]
pub struct Signal {
	subscribers: Vec<Subscriber>,
}

impl Signal {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn connect(&mut self, observer: Observer) {
		self.subscribers.push(Subscriber::Observer(observer));
	}

	pub fn connect_bound(&mut self, target: NodeUuid, method: impl Into<String>) {
		self.subscribers.push(Subscriber::Bound(Binding {
			target,
			method: method.into(),
		}));
	}

	/// Removes the first connection of `observer`, if any.
	pub fn disconnect(&mut self, observer: &Observer) -> bool {
		let position = self.subscribers.iter().position(|s| match s {
			Subscriber::Observer(o) => Rc::as_ptr(o) as *const () == Rc::as_ptr(observer) as *const (),
			Subscriber::Bound(_) => false,
		});
		match position {
			Some(i) => {
				self.subscribers.remove(i);
				true
			}
			None => false,
		}
	}

	pub fn disconnect_bound(&mut self, target: NodeUuid, method: &str) -> bool {
		let position = self.subscribers.iter().position(|s| match s {
			Subscriber::Bound(b) => b.target == target && b.method == method,
			Subscriber::Observer(_) => false,
		});
		match position {
			Some(i) => {
				self.subscribers.remove(i);
				true
			}
			None => false,
		}
	}

	pub fn bindings(&self) -> impl Iterator<Item = &Binding> {
		self.subscribers.iter().filter_map(|s| match s {
			Subscriber::Bound(b) => Some(b),
			Subscriber::Observer(_) => None,
		})
	}

	/// Rewrites or drops persistable bindings. Observers are kept as is.
	pub fn retain_bindings(&mut self, mut f: impl FnMut(&mut Binding) -> bool) {
		self.subscribers.retain_mut(|s| match s {
			Subscriber::Bound(b) => f(b),
			Subscriber::Observer(_) => true,
		});
	}

	pub fn len(&self) -> usize {
		self.subscribers.len()
	}

	pub fn is_empty(&self) -> bool {
		self.subscribers.is_empty()
	}

	/// Notifies every subscriber in connection order.
	///
	/// A failing observer does not stop the emission: failures are collected and returned once
	/// all subscribers ran. Bindings are handed to `on_binding`, which is expected to queue the
	/// call rather than run it.
	pub fn emit(&self, args: &[Variant], mut on_binding: impl FnMut(&Binding)) -> Result<(), SignalError> {
		let mut failures = Vec::new();
		for subscriber in &self.subscribers {
			match subscriber {
				Subscriber::Observer(observer) => {
					if let Err(e) = observer(args) {
						warn!("Signal subscriber failed: {e}");
						failures.push(e.to_string());
					}
				}
				Subscriber::Bound(binding) => on_binding(binding),
			}
		}

		if failures.is_empty() {
			Ok(())
		} else {
			Err(SignalError {
				total: self.subscribers.len(),
				failures,
			})
		}
	}
}

impl fmt::Debug for Signal {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let observers = self
			.subscribers
			.iter()
			.filter(|s| matches!(s, Subscriber::Observer(_)))
			.count();
		f.debug_struct("Signal")
			.field("observers", &observers)
			.field("bindings", &self.bindings().collect::<Vec<_>>())
			.finish()
	}
}
