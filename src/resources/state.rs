use crate::schema::{Column, Field, HasMany, InfoSection, ResourceSchema, SortDirection};

pub fn schema() -> ResourceSchema {
    ResourceSchema::new("states", "State")
        .navigation("System Management", "State", "heroicon-o-building-library", Some(2))
        .fields(vec![
            Field::belongs_to("country_id", "Country", "countries").required(),
            Field::text("name", "State Name").required(),
        ])
        .columns(vec![
            Column::new("country.name")
                .label("Country")
                .sortable()
                .searchable_individually_only(),
            Column::new("name")
                .label("State Name")
                .sortable()
                .searchable_individually(),
            Column::new("created_at").date_time().sortable().hidden_by_default(),
            Column::new("updated_at").date_time().sortable().hidden_by_default(),
        ])
        .default_sort("name", SortDirection::Asc)
        .infolist(vec![InfoSection::new(
            "State Info",
            2,
            &[("country.name", "Country Name"), ("name", "State Name")],
        )])
        .has_many(vec![
            HasMany::new("cities", "cities", "state_id").managed(),
            HasMany::new("employees", "employees", "state_id").managed(),
        ])
}
