#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Integration of the AiSound 5 speech engine with system audio ducking.
//!
//! # Features
//!
//! The AiSound engine is a closed native library that plays its own audio through the
//! `waveOut` API. This crate drives the engine on behalf of a host speech pipeline and makes sure
//! that, while the engine is speaking, other system audio is ducked (temporarily attenuated).
//!
//! ## Speech
//!
//! The [engine] module provides the [`Engine`](engine::Engine) facade. It loads the native
//! library on first use, forwards configuration and speech requests, and translates the engine's
//! playback callbacks into [notifications](playback::Notification) the host receives through an
//! [`EventHandler`](playback::EventHandler).
//!
//! ## Ducking
//!
//! The engine's audio layer calls `waveOutOpen` and `waveOutClose` through its import table. The
//! [hook] module redirects those two imports to interceptors in the [wave_out] module, which pair
//! every successfully opened device with a [`DuckingSession`](ducking::DuckingSession). The
//! session is released as soon as the device is closed. The ducking service itself belongs to the
//! host and is plugged in through the [`AudioDucking`](ducking::AudioDucking) trait.
//!
//! # Threads
//!
//! The engine raises its callbacks on a thread it owns. Notifications are delivered to the event
//! handler on that thread, in the order the engine raised them. With the `tokio` feature enabled,
//! the [tokio] module offers a channel-backed handler the host can drain on its own schedule.

use std::path::PathBuf;

pub mod ducking;
pub mod engine;
pub mod hook;
mod native_util;
pub mod playback;
pub mod wave_out;

#[cfg(feature = "tokio")]
pub mod tokio;

pub use hook::HookInstallError;
pub use native_util::EncodingError;

/// The error type returned by this crate's functions and methods.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An import-table interception could not be installed.
    #[error(transparent)]
    HookInstall(#[from] HookInstallError),
    /// The native engine library could not be loaded.
    #[error("could not load the speech engine from {path}: {reason}")]
    Load {
        /// Path of the library that failed to load.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },
    /// An operation needed the native engine before it was initialized.
    #[error("the speech engine has not been initialized")]
    NotInitialized,
    /// A string could not be converted to the engine's text encoding.
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    /// A Windows API call failed.
    #[cfg(windows)]
    #[error(transparent)]
    Windows(#[from] windows::core::Error),
}

/// The type returned by this crate's functions and methods.
pub type Result<T> = std::result::Result<T, Error>;
