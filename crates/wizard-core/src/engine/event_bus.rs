//! Event bus for wizard events.
//!
//! A thin wrapper over a tokio broadcast channel. Publishing never blocks;
//! subscribers that fall behind the channel capacity miss the oldest events.

use tokio::sync::broadcast;
use wizard_types::WizardEvent;

/// Capacity used when none is configured.
pub const DEFAULT_CAPACITY: usize = 256;

/// Fan-out channel shared by the components of a wizard.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<WizardEvent>,
}

impl EventBus {
	/// Creates a new event bus holding up to `capacity` unread events.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity.max(1));
		Self { sender }
	}

	/// Subscribes to all events published after this call.
	pub fn subscribe(&self) -> broadcast::Receiver<WizardEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event to all current subscribers.
	///
	/// Fails only when nobody is subscribed.
	pub fn publish(
		&self,
		event: WizardEvent,
	) -> Result<usize, broadcast::error::SendError<WizardEvent>> {
		self.sender.send(event)
	}

	pub fn subscriber_count(&self) -> usize {
		self.sender.receiver_count()
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(DEFAULT_CAPACITY)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use wizard_types::{SaveEvent, StepEvent, StepId};

	#[tokio::test]
	async fn test_subscribers_receive_in_order() {
		let bus = EventBus::new(8);
		let mut first = bus.subscribe();
		let mut second = bus.subscribe();

		bus.publish(WizardEvent::Save(SaveEvent::Saving { revision: 1 }))
			.unwrap();
		bus.publish(WizardEvent::Step(StepEvent::Changed {
			from: StepId::Contact,
			to: StepId::Options,
			number: 2,
		}))
		.unwrap();

		for receiver in [&mut first, &mut second] {
			assert_eq!(
				receiver.recv().await.unwrap(),
				WizardEvent::Save(SaveEvent::Saving { revision: 1 })
			);
			assert!(matches!(
				receiver.recv().await.unwrap(),
				WizardEvent::Step(StepEvent::Changed { number: 2, .. })
			));
		}
	}

	#[test]
	fn test_publish_without_subscribers_fails() {
		let bus = EventBus::default();
		assert_eq!(bus.subscriber_count(), 0);
		assert!(bus
			.publish(WizardEvent::Save(SaveEvent::Saving { revision: 1 }))
			.is_err());
	}
}
