// HTTP handlers. Path parsing, body decoding and envelopes live here; every
// decision about access, validity and storage is delegated to DocumentService.
pub mod documents;
pub mod system;
