use crate::schema::{
    Column, Field, Filter, FormSection, InfoSection, ListTab, Notification, Notifications, Period,
    ResourceSchema, UnsetParent,
};

/// Employees pick one country, state and city; the state and city selects
/// stay empty until their parent is chosen.
pub fn schema() -> ResourceSchema {
    ResourceSchema::new("employees", "Employee")
        .navigation("Employee Management", "Employees", "heroicon-o-user-group", None)
        .fields(vec![
            Field::belongs_to("country_id", "Country", "countries").required(),
            Field::belongs_to("state_id", "State", "states")
                .required()
                .depends_on("country_id", UnsetParent::ShowNone),
            Field::belongs_to("city_id", "City", "cities")
                .required()
                .depends_on("state_id", UnsetParent::ShowNone),
            Field::belongs_to("department_id", "Department", "departments").required(),
            Field::text("first_name", "First name").required(),
            Field::text("last_name", "Last name").required(),
            Field::text("middle_name", "Middle name"),
            Field::text("address", "Address").required(),
            Field::text("zip_code", "Zip code").required(),
            Field::date("date_of_birth", "Date of birth").required(),
            Field::date("date_hired", "Date hired").required(),
        ])
        .form(vec![
            FormSection::new("Relationships")
                .columns(2)
                .fields(&["country_id", "state_id", "city_id", "department_id"]),
            FormSection::new("User Name")
                .description("Put the user name details in")
                .columns(3)
                .fields(&["first_name", "last_name", "middle_name"]),
            FormSection::new("User address")
                .description("Put the user address details in")
                .columns(2)
                .fields(&["address", "zip_code"]),
            FormSection::new("Dates")
                .description("Put the user employment details in")
                .columns(2)
                .fields(&["date_of_birth", "date_hired"]),
        ])
        .columns(vec![
            Column::new("country.name").sortable().searchable_individually_only(),
            Column::new("first_name").searchable().sortable(),
            Column::new("last_name").searchable(),
            Column::new("middle_name").searchable().hidden_by_default(),
            Column::new("address").searchable().hidden_by_default(),
            Column::new("zip_code").searchable(),
            Column::new("date_of_birth").date().searchable().hidden_by_default(),
            Column::new("date_hired").date().searchable(),
            Column::new("created_at").date_time().sortable().hidden_by_default(),
            Column::new("updated_at").date_time().sortable().hidden_by_default(),
        ])
        .filters(vec![
            Filter::select("department_id", "Filter by Department", "Department"),
            Filter::created_between(),
        ])
        .infolist(vec![
            InfoSection::new(
                "Relationships",
                2,
                &[
                    ("country.name", "Country Name"),
                    ("state.name", "State Name"),
                    ("city.name", "City Name"),
                    ("department.name", "Department Name"),
                ],
            ),
            InfoSection::new(
                "Name",
                3,
                &[
                    ("first_name", "First Name"),
                    ("last_name", "Last Name"),
                    ("middle_name", "Middle Name"),
                ],
            ),
            InfoSection::new("Address", 2, &[("address", "Address"), ("zip_code", "Zip Code")]),
            InfoSection::new(
                "Dates",
                2,
                &[("date_of_birth", "Date of Birth"), ("date_hired", "Date Hired")],
            ),
        ])
        .tabs(vec![
            ListTab::all(),
            ListTab::since("this_week", "This Week", "date_hired", Period::Week),
            ListTab::since("this_month", "This Month", "date_hired", Period::Month),
            ListTab::since("this_year", "This Year", "date_hired", Period::Year),
        ])
        .notifications(Notifications {
            saved: Notification::success("Employee Updated")
                .body("The employee has been updated successfully."),
            ..Notifications::default()
        })
        .title_fields(&["first_name", "last_name"])
}
