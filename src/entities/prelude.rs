#![allow(unused_imports)]

pub use super::allowed_phone::Entity as AllowedPhone;
pub use super::campaign::Entity as Campaign;
pub use super::coupon::Entity as Coupon;
pub use super::prize::Entity as Prize;
pub use super::spin::Entity as Spin;
