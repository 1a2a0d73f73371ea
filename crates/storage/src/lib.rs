pub mod cache;

pub use cache::{select_cache, DeviceCache, DisabledDeviceCache, SqliteDeviceCache};
