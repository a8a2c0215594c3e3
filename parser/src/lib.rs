//! Reconstructs structured deal records from the assistant's free-text
//! replies.
//!
//! The reply format is whatever the upstream model decided to emit that day:
//! numbered bold item markers, labeled lines for prices and links, and
//! loosely bulleted coupon/cashback/step sections. The parser is therefore
//! deliberately forgiving. A malformed segment is dropped, never an error;
//! an empty result is a valid outcome and "no deals found" messaging is the
//! caller's job.

mod deal;
mod extract;

pub use deal::Cashback;
pub use deal::Coupon;
pub use deal::Deal;
pub use deal::Savings;
pub use extract::parse_deals;
