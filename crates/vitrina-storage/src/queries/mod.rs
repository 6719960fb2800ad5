// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules. Each function takes `&Database` and runs its SQL
//! through the single connection thread.

pub mod categories;
pub mod kv;
pub mod products;
