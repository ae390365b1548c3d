use crate::schema::{Column, Field, FormSection, HasMany, InfoSection, ResourceSchema};

pub fn schema() -> ResourceSchema {
    ResourceSchema::new("departments", "Department")
        .navigation("System Management", "Department", "heroicon-o-academic-cap", Some(4))
        .fields(vec![Field::text("name", "Department Name").required()])
        .form(vec![FormSection::new("Department Details").fields(&["name"])])
        .columns(vec![
            Column::new("name")
                .label("Department Name")
                .sortable()
                .searchable_individually(),
            Column::new("employees_count").label("Employees"),
            Column::new("created_at").date_time().sortable().hidden_by_default(),
            Column::new("updated_at").date_time().sortable().hidden_by_default(),
        ])
        .infolist(vec![InfoSection::new(
            "Department Info",
            2,
            &[("name", "Name"), ("employees_count", "Employees")],
        )])
        .has_many(vec![HasMany::new("employees", "employees", "department_id")])
}
