pub mod page_file;
pub mod provider_page;
pub mod schedule;

pub use page_file::PageFileSource;
pub use provider_page::{ProviderClient, ProviderPage, ProviderPageSource};
pub use schedule::{IntervalSchedule, Schedule, Ticks};
