use hazard_common::{Hazard, Query, HAZARDS, LOCATIONS};

/// Cartesian product of hazards and locations, hazard-major.
pub fn generate_queries<'a, L>(
    hazards: &'a [Hazard],
    locations: &'a [L],
) -> impl Iterator<Item = Query> + 'a
where
    L: AsRef<str>,
{
    hazards.iter().flat_map(move |&hazard| {
        locations
            .iter()
            .map(move |location| Query::new(hazard, location.as_ref()))
    })
}

/// Queries over the fixed coastal vocabularies.
pub fn default_queries() -> impl Iterator<Item = Query> {
    generate_queries(&HAZARDS, &LOCATIONS)
}
