//! HTML -> `PageSnapshot` scraping.
//!
//! The course page renders one table row per registerable session: the
//! session identifier sits in a `td.ver_id a` link and the row's action cell
//! carries one submit form per available operation. Controls are classified
//! by their submit label; the German labels are what the live system uses,
//! the English ones keep fixtures and other deployments working.

use scraper::{ElementRef, Html, Selector};

use super::{Control, ControlKind, PageError, PageSnapshot, SessionRow};

/// Parse a rendered course page. A page without the expected table yields an
/// empty snapshot, not an error -- the driver treats it as "nothing
/// available" and retries after a reload.
pub fn parse_page(html: &str, fallback_course: &str) -> Result<PageSnapshot, PageError> {
    let document = Html::parse_document(html);

    let row_sel = selector("table.b3k-data tr")?;
    let id_sel = selector("td.ver_id a")?;
    let form_sel = selector("td.action form")?;
    let submit_sel = selector("input[type=submit]")?;
    let hidden_sel = selector("input[type=hidden]")?;

    let mut rows = Vec::new();
    let mut unregister_present = false;

    for row in document.select(&row_sel) {
        let Some(id_el) = row.select(&id_sel).next() else {
            continue; // header or separator row
        };
        let id = id_el.text().collect::<String>().trim().to_string();
        if id.is_empty() {
            continue;
        }

        let mut session = SessionRow {
            id: id.clone(),
            ..Default::default()
        };

        for form in row.select(&form_sel) {
            let Some(submit) = form.select(&submit_sel).next() else {
                continue;
            };
            let label = submit.value().attr("value").unwrap_or_default().to_string();
            let Some(kind) = classify_label(&label) else {
                continue;
            };

            let mut fields: Vec<(String, String)> = form
                .select(&hidden_sel)
                .filter_map(|input| {
                    let name = input.value().attr("name")?;
                    let value = input.value().attr("value").unwrap_or_default();
                    Some((name.to_string(), value.to_string()))
                })
                .collect();
            if let Some(name) = submit.value().attr("name") {
                fields.push((name.to_string(), label.clone()));
            }

            let control = Control {
                kind,
                session: id.clone(),
                action: form.value().attr("action").unwrap_or_default().to_string(),
                fields,
                enabled: submit.value().attr("disabled").is_none(),
                label,
            };

            match kind {
                ControlKind::Primary => session.primary = Some(control),
                ControlKind::Waitlist => session.waitlist = Some(control),
                ControlKind::Unregister => unregister_present = true,
            }
        }

        rows.push(session);
    }

    Ok(PageSnapshot {
        course: scrape_course_key(&document).unwrap_or_else(|| fallback_course.to_string()),
        rows,
        unregister_present,
    })
}

fn selector(css: &str) -> Result<Selector, PageError> {
    Selector::parse(css).map_err(|e| PageError::Parse(format!("invalid selector '{css}': {e:?}")))
}

/// The course key comes from the `span[title="PI"]` heading element; pages
/// carry other titled spans, so the selector is anchored to that exact
/// attribute value. The caller falls back to the page URL when it is absent.
fn scrape_course_key(document: &Html) -> Option<String> {
    let title_sel = Selector::parse(r#"span[title="PI"]"#).ok()?;
    document
        .select(&title_sel)
        .map(|el: ElementRef| el.text().collect::<String>().trim().to_string())
        .find(|t| !t.is_empty())
}

fn classify_label(label: &str) -> Option<ControlKind> {
    let label = label.to_lowercase();
    if label.contains("warteliste") || label.contains("waitlist") {
        Some(ControlKind::Waitlist)
    } else if label.contains("abmelden") || label.contains("unregister") {
        Some(ControlKind::Unregister)
    } else if label.contains("anmelden") || label.contains("register") {
        Some(ControlKind::Primary)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_open_page() -> &'static str {
        r#"
        <html><body>
        <div class="nav"><span title="Abmelden">Logout</span></div>
        <h2><span title="PI">Advanced Software Engineering</span></h2>
        <table class="b3k-data">
          <tr><th>LVA</th><th>Plätze</th><th></th></tr>
          <tr>
            <td class="ver_id"><a href="#5471">5471</a></td>
            <td>12/30</td>
            <td class="action">
              <form action="register?sid=5471" method="post">
                <input type="hidden" name="sid" value="5471">
                <input type="hidden" name="token" value="abc123">
                <input type="submit" name="op" value="anmelden">
              </form>
            </td>
          </tr>
          <tr>
            <td class="ver_id"><a href="#5650">5650</a></td>
            <td>30/30</td>
            <td class="action">
              <form action="register?sid=5650" method="post">
                <input type="hidden" name="sid" value="5650">
                <input type="submit" name="op" value="anmelden" disabled>
              </form>
              <form action="waitlist?sid=5650" method="post">
                <input type="hidden" name="sid" value="5650">
                <input type="submit" name="op" value="Warteliste">
              </form>
            </td>
          </tr>
        </table>
        </body></html>
        "#
    }

    fn fixture_registered_page() -> &'static str {
        r#"
        <html><body>
        <table class="b3k-data">
          <tr>
            <td class="ver_id"><a href="#5471">5471</a></td>
            <td class="action">
              <form action="unregister?sid=5471" method="post">
                <input type="hidden" name="sid" value="5471">
                <input type="submit" name="op" value="abmelden">
              </form>
            </td>
          </tr>
        </table>
        </body></html>
        "#
    }

    #[test]
    fn test_scrapes_sessions_and_course_key() {
        let page = parse_page(fixture_open_page(), "fallback").unwrap();
        // Other titled spans (the nav logout link) must not become the key.
        assert_eq!(page.course, "Advanced Software Engineering");
        assert_eq!(page.session_ids(), vec!["5471", "5650"]);
    }

    #[test]
    fn test_enabled_primary_control_carries_form_fields() {
        let page = parse_page(fixture_open_page(), "fallback").unwrap();
        let control = page.primary_action("5471").expect("enabled primary");
        assert_eq!(control.kind, ControlKind::Primary);
        assert_eq!(control.action, "register?sid=5471");
        assert!(control.fields.contains(&("sid".to_string(), "5471".to_string())));
        assert!(control.fields.contains(&("token".to_string(), "abc123".to_string())));
        assert!(control.fields.contains(&("op".to_string(), "anmelden".to_string())));
    }

    #[test]
    fn test_disabled_control_is_unavailable() {
        let page = parse_page(fixture_open_page(), "fallback").unwrap();
        // The control exists on the page but is disabled.
        assert!(page.rows.iter().any(|r| r.id == "5650" && r.primary.is_some()));
        assert!(page.primary_action("5650").is_none());
        // The waitlist control next to it is live.
        assert!(page.waitlist_action("5650").is_some());
    }

    #[test]
    fn test_unregister_control_means_already_registered() {
        let page = parse_page(fixture_registered_page(), "fallback").unwrap();
        assert!(page.is_already_registered());
        assert!(page.primary_action("5471").is_none());

        let open = parse_page(fixture_open_page(), "fallback").unwrap();
        assert!(!open.is_already_registered());
    }

    #[test]
    fn test_missing_table_yields_empty_snapshot() {
        let page = parse_page("<html><body><p>maintenance</p></body></html>", "fb").unwrap();
        assert_eq!(page.course, "fb");
        assert!(page.rows.is_empty());
        assert!(!page.is_already_registered());
    }

    #[test]
    fn test_unknown_session_queries_are_none() {
        let page = parse_page(fixture_open_page(), "fallback").unwrap();
        assert!(page.primary_action("0000").is_none());
        assert!(page.waitlist_action("0000").is_none());
    }
}
