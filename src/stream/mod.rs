// Response streaming: drain a byte source into callbacks, with cancellation.

mod interrupt;
mod pump;
mod types;

pub use interrupt::{Interrupt, InterruptFn, NoInterrupt};
pub use pump::{DEFAULT_BUFFER_SIZE, PumpHandle, StreamPump, pump_channel};
pub use types::{CancelToken, PumpEvent, PumpOutcome, PumpState};
