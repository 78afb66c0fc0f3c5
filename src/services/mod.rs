pub mod appointments;
pub mod booking_builder;
pub mod deadline;
pub mod lifecycle;
pub mod notify;
pub mod task_scheduler;
pub mod time_ranges;
