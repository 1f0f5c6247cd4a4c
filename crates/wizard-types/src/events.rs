//! Event types for communication between wizard components.
//!
//! Events flow through an event bus so that the session, the autosave worker
//! and any observers (UI adapters, logging) can react to each other without
//! holding references.

use crate::{OrderCode, StepId};
use serde::{Deserialize, Serialize};

/// Main event type encompassing all wizard events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WizardEvent {
	/// Events produced by step navigation.
	Step(StepEvent),
	/// Events produced by draft persistence.
	Save(SaveEvent),
}

/// Events related to navigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StepEvent {
	/// The current step changed.
	Changed {
		from: StepId,
		to: StepId,
		/// Display ordinal of the new step among the visible steps.
		number: u32,
	},
	/// A jump was refused because the target is unknown or hidden.
	Rejected { target: StepId, reason: String },
}

/// Events related to draft persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SaveEvent {
	/// A remote write of the given revision started.
	Saving { revision: u64 },
	/// A remote draft record was created and a code assigned.
	DraftCreated { order_code: OrderCode },
	/// A revision of the state has been persisted.
	Saved {
		order_code: OrderCode,
		revision: u64,
		saved_at: u64,
	},
	/// A save attempt failed; the state stays dirty and is retried.
	Failed { revision: u64, error: String },
	/// The draft was submitted.
	Submitted { order_code: OrderCode },
}
