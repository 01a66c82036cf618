pub mod generator;
pub mod schedule;
pub mod slots;

pub use generator::SlotGenerator;
pub use schedule::DoctorScheduleService;
pub use slots::SlotLifecycleManager;
