//! Modem and GSM network state tracking
//!
//! Holds the last known modem state, network registration state, signal
//! quality and SIM balance. The serial reactor thread writes through the
//! controller's event sink while the facade reads snapshots from any thread,
//! so the whole record sits behind a single lock.

use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// State of the modem device itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModemState {
    /// No serial link or no answer from the modem
    #[default]
    Offline,
    /// Serial port open, modem not yet initialised
    Detected,
    /// Modem answered the initialisation sequence
    Online,
}

/// GSM network registration state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GsmState {
    /// Registration not yet queried since the last reset
    #[default]
    InitPending,
    /// SIM card missing, locked or rejected
    NoSim,
    /// Not registered and not searching
    NotRegistered,
    /// Searching for an operator
    Searching,
    /// Registered on the home network
    Online,
    /// Registered while roaming
    Roaming,
    /// Registration denied by the network
    RegDenied,
    /// Registration state reported as unknown
    Unknown,
}

impl GsmState {
    /// Map a `+CREG` `<stat>` value to a state
    pub const fn from_creg_stat(stat: u8) -> Self {
        match stat {
            0 => Self::NotRegistered,
            1 => Self::Online,
            2 => Self::Searching,
            3 => Self::RegDenied,
            5 => Self::Roaming,
            _ => Self::Unknown,
        }
    }

    /// Whether the modem can receive calls in this state
    pub const fn is_registered(self) -> bool {
        matches!(self, Self::Online | Self::Roaming)
    }
}

/// Transition into a state worth reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GsmEdge {
    /// Entered [`GsmState::NoSim`]
    SimMissing,
    /// Entered [`GsmState::Online`]; carries the signal level at that moment
    Registered { signal_level: i32 },
    /// Entered [`GsmState::RegDenied`]
    RegistrationDenied,
}

/// Snapshot of modem status fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModemStatus {
    pub modem_state: ModemState,
    pub gsm_state: GsmState,
    pub signal_level: i32,
    pub bit_error_rate: i32,
}

/// SIM balance as last reported by the operator
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Balance {
    pub value: f64,
    pub valid: bool,
}

#[derive(Debug, Default)]
struct TrackedState {
    status: ModemStatus,
    balance: Balance,
}

/// Thread-safe holder for modem status and balance
#[derive(Debug, Default)]
pub struct ModemStateTracker {
    inner: RwLock<TrackedState>,
}

impl ModemStateTracker {
    /// Create a tracker in the reset state
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, TrackedState> {
        // Plain data; a panicked writer cannot leave it half-updated in a harmful way
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TrackedState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Zero signal quality and mark registration as pending
    pub fn reset_network_states(&self) {
        let mut state = self.write();
        state.status.bit_error_rate = 0;
        state.status.signal_level = 0;
        state.status.gsm_state = GsmState::InitPending;
    }

    /// Network reset plus modem offline and balance invalidated
    pub fn reset_modem_states(&self) {
        let mut state = self.write();
        state.status = ModemStatus::default();
        state.balance = Balance::default();
    }

    pub fn set_modem_state(&self, modem_state: ModemState) {
        self.write().status.modem_state = modem_state;
    }

    /// Store a new registration state, returning the edge if one was crossed.
    ///
    /// Repeating the current state never yields an edge.
    pub fn set_gsm_state(&self, gsm_state: GsmState) -> Option<GsmEdge> {
        let mut state = self.write();
        let previous = std::mem::replace(&mut state.status.gsm_state, gsm_state);
        if previous == gsm_state {
            return None;
        }
        match gsm_state {
            GsmState::NoSim => Some(GsmEdge::SimMissing),
            GsmState::Online => Some(GsmEdge::Registered {
                signal_level: state.status.signal_level,
            }),
            GsmState::RegDenied => Some(GsmEdge::RegistrationDenied),
            _ => None,
        }
    }

    pub fn set_signal(&self, rssi: i32, ber: i32) {
        let mut state = self.write();
        state.status.signal_level = rssi;
        state.status.bit_error_rate = ber;
    }

    pub fn set_balance(&self, value: f64) {
        self.write().balance = Balance { value, valid: true };
    }

    pub fn invalidate_balance(&self) {
        self.write().balance = Balance::default();
    }

    pub fn status(&self) -> ModemStatus {
        self.read().status
    }

    pub fn balance(&self) -> Balance {
        self.read().balance
    }
}
