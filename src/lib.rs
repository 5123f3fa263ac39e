//! Control core for one axis of a motorized equatorial mount.
//!
//! The crate closes a velocity loop around a DC motor with quadrature
//! feedback and exposes the axis through the SkyWatcher-style ASCII/hex
//! command set. Peripheral bring-up stays outside: the loop and the
//! protocol layer talk to hardware only through the traits in [`hal`],
//! so the same code runs against an MCPWM block on the bench and against
//! the mock collaborators in [`test_utils`] on the host.
#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod control;
pub mod hal;
pub mod protocol;
pub mod test_utils;

pub use control::axis::{AxisShared, MotorAxis, VelocityLoop};
pub use control::telemetry::{TickListener, TickReport};
pub use protocol::dispatch::Dispatcher;
pub use protocol::port::CommandPort;
pub use protocol::wire::{CmdError, Response};
