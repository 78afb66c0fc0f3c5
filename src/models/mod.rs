pub mod appointment;
pub mod booking;
pub mod review;
pub mod time_range;

pub use appointment::{
    Appointment, AppointmentRecord, AppointmentStatus, CancellationRequest, ServicePackageTemplate,
    TaskStatus, TaskTemplate, WorkTask, WorkTaskRecord,
};
pub use booking::{
    BookingDraft, BookingRequest, BookingRequestDetails, BookingType, DurationSpec,
    ImmediateDetails, ImmediateRequest, ScheduleDetails, ScheduleRequest, ScheduledDay, TaskDraft,
    WorkSchedule,
};
pub use review::{Ratings, Review, ReviewSubmission};
pub use time_range::{DayPart, TimeRange, TimeRangeError};
