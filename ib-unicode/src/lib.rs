//! Unicode utils.
/*!
## Features
- Fast [ASCII](ascii) scans
- [UTF-8](utf8) lead byte counting and Latin-1 to UTF-8 encoding

## Crate features
*/
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![cfg_attr(feature = "doc", doc = document_features::document_features!())]
pub mod ascii;
pub mod utf8;
