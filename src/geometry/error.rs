// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with antenna geometry.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeometryError {
    #[error("Specified surface file '{0}' doesn't exist")]
    FileNotFound(String),

    #[error("Couldn't read '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// Interpolation needs at least three rows.
    #[error("Surface file '{path}' only has {got} valid (radius, sag, slope) rows; at least 3 are needed")]
    TooFewSamples { path: String, got: usize },

    #[error("Radius doesn't increase at row {row} of surface file '{path}'")]
    NonMonotonicRadius { path: String, row: usize },

    #[error("The feed of band '{band}' sits on the subreflector vertex; can't work out its pointing direction")]
    FeedAtSubreflector { band: String },

    #[error("No receiver band covers {freq_hz} Hz")]
    NoBandForFrequency { freq_hz: f64 },

    #[error("Couldn't parse band table '{path}': {source}")]
    BandTable {
        path: String,
        source: toml::de::Error,
    },

    #[error("Couldn't set up band '{band}' for {freq_hz} Hz: {source}")]
    Band {
        band: String,
        freq_hz: f64,
        #[source]
        source: Box<GeometryError>,
    },

    #[error("Band '{band}' has {got} taper polynomial coefficients; at most {max} are allowed")]
    TaperPolynomial { band: String, got: usize, max: usize },

    /// An error associated with the DISH_BEAM_DATA environment variable.
    #[error("Problem with the DISH_BEAM_DATA variable: {0}")]
    DataRootVar(#[from] std::env::VarError),
}
