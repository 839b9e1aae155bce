//! Page-number window for the list footer.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageItem {
    /// One-based page number
    Page(u32),
    Ellipsis,
}

/// Page numbers to show for one-based `current` out of `total` pages.
///
/// Up to 7 pages are all shown. Otherwise the first and last pages are
/// always present, with the current page's neighbours in between and
/// ellipses over the gaps.
pub fn page_numbers(current: u32, total: u32) -> Vec<PageItem> {
    use PageItem::{Ellipsis, Page};

    if total <= 7 {
        return (1..=total).map(Page).collect();
    }
    if current <= 3 {
        return vec![Page(1), Page(2), Page(3), Page(4), Ellipsis, Page(total)];
    }
    if current >= total - 2 {
        return vec![
            Page(1),
            Ellipsis,
            Page(total - 3),
            Page(total - 2),
            Page(total - 1),
            Page(total),
        ];
    }
    vec![
        Page(1),
        Ellipsis,
        Page(current - 1),
        Page(current),
        Page(current + 1),
        Ellipsis,
        Page(total),
    ]
}

/// One-line page bar, current page in brackets: `1 … 4 [5] 6 … 12`
pub fn page_bar(current: u32, total: u32) -> String {
    page_numbers(current, total)
        .into_iter()
        .map(|item| match item {
            PageItem::Page(n) if n == current => format!("[{}]", n),
            PageItem::Page(n) => n.to_string(),
            PageItem::Ellipsis => "…".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
