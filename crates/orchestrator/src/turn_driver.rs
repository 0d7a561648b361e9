//! Component 8: the turn/tool-round budget driver (§4.8). Wraps
//! [`sa_domain::TurnCounters`] with the pre-step check the Runner calls
//! before every model call and every tool round — budgets are evaluated
//! before the step is attempted, never after, so exhaustion is reported
//! without a wasted call.

use parking_lot::Mutex;

use sa_domain::{StopReason, TurnCounters};

pub struct TurnDriver {
    counters: Mutex<TurnCounters>,
}

impl TurnDriver {
    pub fn new(max_turns: u32, max_tool_rounds: u32) -> Self {
        Self { counters: Mutex::new(TurnCounters::new(max_turns, max_tool_rounds)) }
    }

    /// Whether another turn may begin. `Ok(())` means proceed; `Err`
    /// carries the budget that has been exhausted.
    pub fn can_continue(&self) -> Result<(), StopReason> {
        let c = *self.counters.lock();
        if c.turns >= c.max_turns {
            Err(StopReason::MaxTurns)
        } else if c.tool_rounds >= c.max_tool_rounds {
            Err(StopReason::MaxToolRounds)
        } else {
            Ok(())
        }
    }

    /// Increment `turns` before a model call. Caller must have already
    /// checked [`Self::can_continue`].
    pub fn start_turn(&self) -> u32 {
        let mut c = self.counters.lock();
        c.turns += 1;
        c.turns
    }

    /// Increment `toolRounds` before executing a turn's tool calls.
    pub fn start_tool_round(&self) -> u32 {
        let mut c = self.counters.lock();
        c.tool_rounds += 1;
        c.tool_rounds
    }

    pub fn counters(&self) -> TurnCounters {
        *self.counters.lock()
    }
}
