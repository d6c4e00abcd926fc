use crate::parsers::html;
use url::Url;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_links_in_document_order() {
        let page = r##"<html><body>
            <a href="/rooms">Rooms</a>
            <a href=" https://example.com/spa ">Spa</a>
            <a href="#top">Top</a>
            <a>No href</a>
            <a href="">Empty</a>
            <a href="mailto:info@example.com">Mail</a>
        </body></html>"##;
        let links = html::parse_links(page);
        assert_eq!(
            links,
            vec!["/rooms", "https://example.com/spa", "mailto:info@example.com"]
        );
    }

    #[test]
    fn test_parse_links_empty_document() {
        assert!(html::parse_links("").is_empty());
        assert!(html::parse_links("<p>no links</p>").is_empty());
    }

    #[test]
    fn test_base_href() {
        let page = r#"<html><head><base href="https://cdn.example.com/en/"></head><body></body></html>"#;
        assert_eq!(
            html::base_href(page).as_deref(),
            Some("https://cdn.example.com/en/")
        );
        assert_eq!(html::base_href("<html></html>"), None);
    }

    #[test]
    fn test_outbound_domains_sorted_and_external_only() {
        let page = r#"<html><head>
            <script src="https://www.googletagmanager.com/gtm.js?id=X"></script>
            <link rel="stylesheet" href="https://fonts.googleapis.com/css2?family=Lato">
            <link rel="preconnect" href="https://preconnect.example.net/">
            <script src="/js/app.js"></script>
        </head><body>
            <a href="https://Booking.Engine.io/hotel/1">Book</a>
            <a href="https://www.example.com/rooms">Rooms</a>
            <a href="https://spa.example.com/">Spa</a>
            <a href="//booking.engine.io/other">Again</a>
            <a href="mailto:info@example.com">Mail</a>
            <iframe src="https://www.youtube.com/embed/abc"></iframe>
        </body></html>"#;
        let base = Url::parse("https://www.example.com/").unwrap();
        assert_eq!(
            html::outbound_domains(page, &base, "example.com"),
            vec![
                "booking.engine.io",
                "fonts.googleapis.com",
                "www.googletagmanager.com",
                "www.youtube.com"
            ]
        );
    }

    #[test]
    fn test_outbound_domains_none() {
        let base = Url::parse("https://example.com/").unwrap();
        assert!(html::outbound_domains("<a href='/x'>x</a>", &base, "example.com").is_empty());
    }
}
