//! The resources served by the panel.

pub mod city;
pub mod country;
pub mod department;
pub mod employee;
pub mod state;

use crate::schema::Registry;

pub fn registry() -> Registry {
    Registry::new(vec![
        country::schema(),
        state::schema(),
        city::schema(),
        department::schema(),
        employee::schema(),
    ])
}
