pub mod activity;

pub use activity::{ActiveTaskGuard, ActivitySnapshot, ActivityState};
