//! Error conversions at the infrastructure boundary
//!
//! Everything the dispatcher surfaces is a [`courier_domain::DispatchError`];
//! this module maps transport failures into it.

mod conversions;
