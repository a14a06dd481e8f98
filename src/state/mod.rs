pub mod ipv4_frag;

pub use ipv4_frag::{Fragment, FragmentBuffer, FragmentTable, Reassembled};
