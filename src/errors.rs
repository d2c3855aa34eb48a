// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Errors associated with all aspects of dish_beam.
 */

use thiserror::Error;

use crate::{
    aperture::ApertureError, convfunc::ConvFuncError, geometry::GeometryError,
    trace::PathologyError,
};

#[derive(Error, Debug)]
pub enum DishBeamError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Pathology(#[from] PathologyError),

    #[error(transparent)]
    Aperture(#[from] ApertureError),

    #[error(transparent)]
    ConvFunc(#[from] ConvFuncError),
}
