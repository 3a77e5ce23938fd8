/*
 * Copyright © 2025 The strata contributors
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

pub mod column;
pub mod statistics;
pub mod tuple;
pub mod types;
pub mod value;

pub use column::ColumnDescriptor;
pub use statistics::ValueStatistics;
pub use tuple::{Tuple, TupleId};
pub use types::{SortOrder, Type};
pub use value::Value;
