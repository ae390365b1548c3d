use crate::schema::{Column, Field, HasMany, InfoSection, ResourceSchema};

pub fn schema() -> ResourceSchema {
    ResourceSchema::new("cities", "City")
        .navigation("System Management", "City", "heroicon-o-building-office-2", Some(3))
        .fields(vec![
            Field::belongs_to("state_id", "State", "states").required(),
            Field::text("name", "City Name").required(),
        ])
        .columns(vec![
            Column::new("state.name")
                .label("State")
                .sortable()
                .searchable_individually_only(),
            Column::new("name")
                .label("City Name")
                .sortable()
                .searchable_individually(),
            Column::new("created_at").date_time().sortable().hidden_by_default(),
            Column::new("updated_at").date_time().sortable().hidden_by_default(),
        ])
        .infolist(vec![InfoSection::new(
            "City Info",
            2,
            &[("state.name", "State Name"), ("name", "City Name")],
        )])
        .has_many(vec![HasMany::new("employees", "employees", "city_id")])
}
