//! Ambient drifting-bubble background.
//!
//! The simulation keeps a pool of soft colored blobs that wander along a noise
//! flow field, push each other apart, stay tethered to their spawn points and
//! slowly shift hue and size. Frames are painted into a caller-owned RGBA
//! [`Canvas`]; a [`FrameLoop`] drives everything through an injected [`Host`]
//! and [`Clock`] so the loop runs the same under a terminal, a window or a test.

pub mod bubble;
pub mod color;
pub mod config;
pub mod grid;
pub mod noise;
pub mod physics;
pub mod render;
pub mod scheduler;
pub mod sim;

pub use bubble::{Bubble, BubblePool};
pub use color::{Hsl, Rgb};
pub use config::BubbleConfig;
pub use grid::OccupancyGrid;
pub use noise::Noise;
pub use physics::Integrator;
pub use render::{Canvas, Pixel, Renderer};
pub use scheduler::{
    Clock, FrameHandle, FrameLoop, Host, LoopState, ObserverHandle, SystemClock, TickOutcome,
    TimerHandle,
};
pub use sim::Simulation;
