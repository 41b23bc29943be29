//! Page-side collaborators of the background: section reveal on scroll and
//! the contact form.

pub mod contact;
pub mod reveal;

pub use contact::{
    ContactForm, ContactResponse, FormState, FormStatus, FormTransport, ReqwestTransport,
    TransportError,
};
pub use reveal::{IntersectionEntry, RevealObserver, DEFAULT_THRESHOLD};
