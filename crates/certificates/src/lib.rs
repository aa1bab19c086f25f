//! `certportal-certificates`: the certificate lifecycle model.
//!
//! Pure data: typed certificates, their display normalization, the per-shell
//! selection set, status tabs, and the create/view/edit form state.

pub mod certificate;
pub mod display;
pub mod filter;
pub mod form;
pub mod selection;

pub use certificate::{Certificate, CertificateRow, CertificateStatus, RawCertificate, normalize};
pub use filter::{CertificateFilter, StatusTab};
pub use form::{
    CertificateDraft, CertificateForm, CertificatePayload, FieldView, FormField, FormMode,
    generate_cert_no,
};
pub use selection::SelectionSet;
