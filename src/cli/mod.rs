pub mod rate;
pub mod refresh;
pub mod report;
pub mod setup;
pub mod ui;
