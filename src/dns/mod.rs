//! Wire-format building blocks: bounds-checked cursor, domain names,
//! record type enums and canonically ordered RRsets.

pub mod cursor;
pub mod enums;
pub mod name;
pub mod rrset;

pub use cursor::WireCursor;
pub use enums::{DNSResourceClass, DNSResourceType};
pub use name::Name;
pub use rrset::RRset;
