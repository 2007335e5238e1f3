//! Extraction script generation.
//!
//! The scraper fetches the target page (or every page of the pagination
//! template), pulls one record per container element through the
//! `scraper_utils` helpers and saves the records with `csv_utils`.

use super::quote::{py_str, py_str_list};
use super::spec::{ExtractionPlan, FieldPlan, FieldSource};

fn describe_field(field: &FieldPlan) -> String {
    let source = match &field.source {
        FieldSource::Content => "content".to_owned(),
        FieldSource::Attribute(name) => format!("attribute {}", py_str(name)),
    };
    format!(
        "#   {}: {} ({source}, {})\n",
        py_str(&field.column_name),
        py_str(&field.selector),
        field.data_type.as_str()
    )
}

fn extractor_entry(field: &FieldPlan) -> String {
    let source = match &field.source {
        FieldSource::Content => "'type': 'text'".to_owned(),
        FieldSource::Attribute(name) => {
            format!("'type': 'attribute', 'attribute': {}", py_str(name))
        }
    };
    format!(
        "    {}: {{'selector': {}, {source}, 'dataType': '{}'}},\n",
        py_str(&field.column_name),
        py_str(&field.selector),
        field.data_type.as_str()
    )
}

fn config_header(plan: &ExtractionPlan) -> String {
    let pagination = plan
        .pagination_template
        .as_deref()
        .map_or_else(|| "none".to_owned(), py_str);
    let fields: String = plan.fields.iter().map(describe_field).collect();
    format!(
        "# Configuration:\n\
         #   target url: {url}\n\
         #   pagination template: {pagination}\n\
         #   pages: {pages}\n\
         #   container selector: {container}\n\
         # Field mappings:\n\
         {fields}",
        url = py_str(&plan.target_url),
        pages = plan.pages,
        container = py_str(&plan.container),
    )
}

/// Render the scraper for `plan`, saving records to `output_file`.
pub fn render_extraction_script(plan: &ExtractionPlan, output_file: &str) -> String {
    let extractors: String = plan.fields.iter().map(extractor_entry).collect();
    let template = plan
        .pagination_template
        .as_deref()
        .map_or_else(|| "None".to_owned(), py_str);

    format!(
        r#"# Web scraper script
# Generated by pipewright; regenerated on every run.
#
{header}
import sys
import time

from csv_utils import save_to_csv
from scraper_utils import fetch_page, scrape_items, generate_pagination_urls

TARGET_URL = {url}
PAGINATION_TEMPLATE = {template}
PAGES = {pages}
CONTAINER_SELECTOR = {container}
OUTPUT_FILE = {output}

FIELD_EXTRACTORS = {{
{extractors}}}

FIELDNAMES = {fieldnames}


def main():
    print("=" * 70)
    print("Web Scraper - Starting")
    print("=" * 70)
    print(f"Target: {{TARGET_URL}}")
    print(f"Container: {{CONTAINER_SELECTOR}}")
    print(f"Fields: {{', '.join(FIELDNAMES)}}")
    print()

    if PAGINATION_TEMPLATE:
        urls = generate_pagination_urls(PAGINATION_TEMPLATE, 1, PAGES)
    else:
        urls = [TARGET_URL]
    print(f"Scraping {{len(urls)}} page(s)...\n")

    all_data = []
    for page_num, url in enumerate(urls, 1):
        print(f"--- Page {{page_num}}/{{len(urls)}} ---")
        soup = fetch_page(url)
        if not soup:
            print(f"Failed to fetch page {{page_num}}, skipping...\n")
            continue

        page_data = scrape_items(soup, CONTAINER_SELECTOR, FIELD_EXTRACTORS)
        all_data.extend(page_data)
        print(f"Page {{page_num}}: extracted {{len(page_data)}} items")
        print(f"Total items collected: {{len(all_data)}}\n")

        if page_num < len(urls):
            time.sleep(1)

    print("=" * 70)
    if not all_data:
        print("No data was extracted. Check your selectors.", file=sys.stderr)
        sys.exit(1)

    if not save_to_csv(all_data, FIELDNAMES, OUTPUT_FILE):
        print("Failed to save data to CSV", file=sys.stderr)
        sys.exit(1)

    print(f"Successfully scraped {{len(all_data)}} items")
    print(f"Data saved to: {{OUTPUT_FILE}}")
    for field in FIELDNAMES:
        empty_count = sum(1 for row in all_data if not row.get(field))
        if empty_count > 0:
            print(f"  '{{field}}': {{empty_count}} empty values")
    print("=" * 70)


if __name__ == "__main__":
    try:
        main()
    except KeyboardInterrupt:
        print("\nScraping interrupted", file=sys.stderr)
        sys.exit(1)
"#,
        header = config_header(plan),
        url = py_str(&plan.target_url),
        pages = plan.pages,
        container = py_str(&plan.container),
        output = py_str(output_file),
        fieldnames = py_str_list(&plan.column_names()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::spec::FieldType;

    fn plan() -> ExtractionPlan {
        ExtractionPlan {
            target_url: "https://scrapeme.live/shop".to_owned(),
            container: "li.product".to_owned(),
            pagination_template: Some("https://scrapeme.live/shop/page/{page}".to_owned()),
            pages: 3,
            fields: vec![
                FieldPlan {
                    column_name: "name".to_owned(),
                    selector: "h2.title".to_owned(),
                    source: FieldSource::Content,
                    data_type: FieldType::Text,
                },
                FieldPlan {
                    column_name: "link".to_owned(),
                    selector: "a".to_owned(),
                    source: FieldSource::Attribute("href".to_owned()),
                    data_type: FieldType::Text,
                },
            ],
        }
    }

    #[test]
    fn test_constants_and_fieldnames() {
        let script = render_extraction_script(&plan(), "scraped_data.csv");
        assert!(script.contains(r#"TARGET_URL = "https://scrapeme.live/shop""#));
        assert!(script.contains(r#"PAGINATION_TEMPLATE = "https://scrapeme.live/shop/page/{page}""#));
        assert!(script.contains("PAGES = 3\n"));
        assert!(script.contains(r#"OUTPUT_FILE = "scraped_data.csv""#));
        assert!(script.contains(r#"FIELDNAMES = ["name", "link"]"#));
    }

    #[test]
    fn test_extractors_keep_field_order() {
        let script = render_extraction_script(&plan(), "out.csv");
        let name = script
            .find(r#""name": {'selector': "h2.title", 'type': 'text', 'dataType': 'text'},"#)
            .expect("content extractor");
        let link = script
            .find(r#""link": {'selector': "a", 'type': 'attribute', 'attribute': "href", 'dataType': 'text'},"#)
            .expect("attribute extractor");
        assert!(name < link);
    }

    #[test]
    fn test_without_pagination_scrapes_target_only() {
        let mut p = plan();
        p.pagination_template = None;
        let script = render_extraction_script(&p, "out.csv");
        assert!(script.contains("PAGINATION_TEMPLATE = None\n"));
        assert!(script.contains("urls = [TARGET_URL]"));
        assert!(script.contains("#   pagination template: none\n"));
    }

    #[test]
    fn test_selectors_are_quoted() {
        let mut p = plan();
        p.container = "div[data-x=\"1\"]\nimport os".to_owned();
        let script = render_extraction_script(&p, "out.csv");
        assert!(script.contains(r#"CONTAINER_SELECTOR = "div[data-x=\"1\"]\nimport os""#));
        assert!(!script.lines().any(|l| l.trim_start() == "import os"));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let p = plan();
        assert_eq!(
            render_extraction_script(&p, "out.csv"),
            render_extraction_script(&p, "out.csv")
        );
    }
}
