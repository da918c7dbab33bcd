pub mod google;
pub mod nominatim;

pub use google::{GoogleClient, DEFAULT_GOOGLE_ENDPOINT};
pub use nominatim::{NominatimClient, DEFAULT_NOMINATIM_ENDPOINT};
