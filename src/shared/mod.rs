pub mod batch;
pub mod clock;
pub mod fs_atomic;
