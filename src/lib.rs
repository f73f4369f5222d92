//! Decoder for Anritsu spectrum analyzer save files.
//!
//! A save file is plain text whose nesting is implied by line markers.
//! [`decode`] turns it into an ordered [`Record`] tree with the header
//! entries gathered under `METADATA`, and [`extract`] pulls the
//! `P_<n>` trace out of that tree as a frequency / power series.
//!
//! ```
//! use rusty_anritsu::{decode, extract};
//!
//! let record = decode("Model=MS2723B\n# Begin Trace\nP_0=-42.1 , 100.0 MHz\n# Trace Done\n").unwrap();
//! let series = extract(&record).unwrap();
//! assert_eq!(series.frequencies, vec![100.0]);
//! assert_eq!(series.powers, vec![-42.1]);
//! ```

pub mod data;
pub mod error;

pub use data::decoder::{decode, Decoder, DecoderConfig, DONE_LEVEL_FLOOR};
pub use data::extract::extract;
pub use data::loader::{LoadOptions, SpectrumData};
pub use data::model::{Record, SpectrumSeries, Value, METADATA_KEY};
pub use error::{Error, Result};
