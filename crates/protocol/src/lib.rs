//! gate-protocol – Frame-Format
//!
//! Jede Nachricht beginnt mit einem festen Kopf, danach folgt der
//! Nachrichten-Code, nach dem das Gateway den Handler auswaehlt.

pub mod wire;

pub use wire::{FrameCodec, Nachricht};
