//! Practitioner page extraction
//!
//! Every field is optional on its own: a missing element leaves the field
//! out (scalars) or empty (lists). Only a selector that fails to compile
//! turns the page into an extraction gap.

use super::Handler;
use crate::crawler::document::Document;
use crate::crawler::outcome::{ExtractionGap, HandlerOutput};
use crate::crawler::record::DetailRecord;
use crate::crawler::task::{Label, Task};

const FIRST_NAME: &str = "#user_full_name > span.user-name-first";
const MIDDLE_NAME: &str = "#user_full_name > span.user-name-middle";
const LAST_NAME: &str = "#user_full_name > span.user-name-last";
const SUFFIX: &str = "#user_full_name > span.user-name-suffix";
const CREDENTIALS: &str = "#user_full_name > span.user-name-credentials";
const CREDENTIALS_ADDITIONAL: &str = "#user_full_name > span.user-name-credentials-additional";
const SPECIALITY: &str = ".profile-head-subtitle";
const SUMMARY: &str = ".profile-summary-content";
const CITY: &str = "#PostalAddress > span:nth-child(2) > a";
const STATE: &str = "#PostalAddress > span:nth-child(3) > a";

const CONTACT_SECTION: &str = ".profile-contact-information";
const OFFICE_ADDRESS: &str = ".profile-contact-information-office-line-item";
const PHONE_NUMBER: &str = ".office-info-telephone";
const FAX_NUMBER: &str = ".office-info-fax";

/// (item selector, child selector) pairs of the list fields
const EDUCATION: (&str, &str) = (r#".education-info li[itemprop="alumniOf"]"#, "div > span");
const CERTIFICATIONS: (&str, &str) = (".certification-info li.show_more_hidden", "div > span");
const LICENSES: (&str, &str) = (".certification-info li:not(.show_more_hidden)", "span");
const AWARDS: (&str, &str) = (".award-info li", "span");
const HOSPITALS: (&str, &str) = (r#".hospital-info li[itemprop="affiliation"]"#, "div > span");

/// Handles practitioner pages: one record per page
pub struct DetailHandler;

impl Handler for DetailHandler {
    fn label(&self) -> Label {
        Label::Detail
    }

    fn handle(&self, task: &Task, document: &Document) -> Result<HandlerOutput, ExtractionGap> {
        let record = extract_record(document)?;
        tracing::debug!("Extracted '{}' from {}", record.display_name(), task.url);
        Ok(HandlerOutput::record(record))
    }
}

/// Extracts every field of a practitioner page
pub fn extract_record(document: &Document) -> Result<DetailRecord, ExtractionGap> {
    let credentials = match document.first_text(CREDENTIALS)? {
        Some(credentials) => Some(credentials),
        None => document.first_text(CREDENTIALS_ADDITIONAL)?,
    };

    // Inside a contact section, missing lines are recorded as empty
    let (office_address, phone_number, fax_number) = if document.exists(CONTACT_SECTION)? {
        (
            Some(contact_line(document, OFFICE_ADDRESS)?),
            Some(contact_line(document, PHONE_NUMBER)?),
            Some(contact_line(document, FAX_NUMBER)?),
        )
    } else {
        (None, None, None)
    };

    Ok(DetailRecord {
        first_name: document.first_text(FIRST_NAME)?,
        middle_name: document.first_text(MIDDLE_NAME)?,
        last_name: document.first_text(LAST_NAME)?,
        suffix: document.first_text(SUFFIX)?,
        credentials,
        speciality: document.first_text(SPECIALITY)?,
        office_address,
        phone_number,
        fax_number,
        summary: document.first_text(SUMMARY)?,
        city: document.first_text(CITY)?,
        state: document.first_text(STATE)?,
        education_and_trainings: list_field(document, EDUCATION)?,
        certifications: list_field(document, CERTIFICATIONS)?,
        licenses: list_field(document, LICENSES)?,
        awards: list_field(document, AWARDS)?,
        hospitals: list_field(document, HOSPITALS)?,
    })
}

fn contact_line(document: &Document, css: &str) -> Result<String, ExtractionGap> {
    Ok(document
        .first_text_within(CONTACT_SECTION, css)?
        .unwrap_or_default())
}

fn list_field(
    document: &Document,
    (items, children): (&str, &str),
) -> Result<Vec<String>, ExtractionGap> {
    document.joined_items(items, children)
}
