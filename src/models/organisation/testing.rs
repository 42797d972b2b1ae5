use super::OrganisationPayload;

/// Generate an OrganisationPayload for testing.
/// Parameter `i` controls the value of some of the fields, just to make sure that the objects
/// don't all look identical.
pub fn make_create_payload(i: usize) -> OrganisationPayload {
    OrganisationPayload {
        title: Some(format!("Test organisation {i}")),
        content: Some(format!("Content for organisation {i}")),
    }
}

/// Generate an OrganisationPayload for updating an object.
pub fn make_update_payload(i: usize) -> OrganisationPayload {
    OrganisationPayload {
        title: Some(format!("Updated organisation {i}")),
        content: Some(format!("Updated content {i}")),
    }
}
