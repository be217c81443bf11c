//! BannerSwap Application
//!
//! The controller that owns the editing session, page cache, loader and
//! exporter, plus the `bannerswap` command-line front end.

mod config;
mod controller;
mod gallery;
mod indicator;
mod notice;
mod worker;

pub use config::AppConfig;
pub use controller::{Command, Controller, ControllerError, ControllerResult};
pub use gallery::BannerGallery;
pub use indicator::{IndicatorSlot, LoadingIndicator, LoadingOperation, RenderTimeout};
pub use notice::{Notice, NoticeLevel};
pub use worker::{LoadEvent, LoadJob, LoadOutcome, LoadWorker};
