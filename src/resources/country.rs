use crate::schema::{Column, Field, HasMany, InfoSection, ResourceSchema};

pub fn schema() -> ResourceSchema {
    ResourceSchema::new("countries", "Employees Country")
        .navigation("System Management", "Country", "heroicon-o-flag", Some(1))
        .fields(vec![
            Field::text("name", "Name").required(),
            Field::text("code", "Country code").required().max_length(3),
            Field::integer("phonecode", "Phone code", 5).required(),
        ])
        .columns(vec![
            Column::new("name").searchable().sortable(),
            Column::new("code").searchable().sortable(),
            Column::new("phonecode").numeric(),
        ])
        .infolist(vec![InfoSection::new(
            "Country Info",
            2,
            &[("name", "Name"), ("code", "Country Code"), ("phonecode", "Phone Code")],
        )])
        .has_many(vec![
            HasMany::new("states", "states", "country_id"),
            HasMany::new("employees", "employees", "country_id").managed(),
        ])
}
