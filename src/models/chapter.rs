//! Chapter model and reading-order rules
//!
//! Every book keeps its chapters at `order_index` values `1..=N` with no gaps
//! and no duplicates. `chapter_number` is only the author's label and may skip
//! numbers. The planning functions here are pure; the repository applies the
//! resulting plans inside transactions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A chapter of a book
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    pub id: i64,
    pub book_id: i64,
    pub title: String,
    /// Author-facing label
    pub chapter_number: i32,
    /// Reading position within the book, dense from 1
    pub order_index: i32,
    pub cover_url: Option<String>,
    /// PDF or Google Drive link
    pub pdf_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chapter {
    /// New chapter for `book_id`; the repository assigns `order_index`.
    pub fn new(book_id: i64, input: ChapterInput) -> Self {
        let now = Utc::now();
        let mut chapter = Self {
            id: 0,
            book_id,
            title: String::new(),
            chapter_number: 0,
            order_index: 0,
            cover_url: None,
            pdf_url: None,
            created_at: now,
            updated_at: now,
        };
        chapter.apply(input);
        chapter
    }

    /// Overwrite the editable fields. Position and owning book are untouched.
    pub fn apply(&mut self, input: ChapterInput) {
        self.title = input.title.trim().to_string();
        self.chapter_number = input.chapter_number;
        self.cover_url = super::non_blank(input.cover_url);
        self.pdf_url = super::non_blank(input.pdf_url).or(super::non_blank(input.google_drive_link));
        self.updated_at = Utc::now();
    }

    /// Kind of link behind `pdf_url`
    pub fn pdf_source(&self) -> Option<PdfSource> {
        self.pdf_url.as_deref().map(PdfSource::of_url)
    }
}

/// Input for creating or updating a chapter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChapterInput {
    pub title: String,
    pub chapter_number: i32,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub pdf_url: Option<String>,
    /// Used when no `pdf_url` is given
    #[serde(default)]
    pub google_drive_link: Option<String>,
}

/// Where a chapter's document is hosted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PdfSource {
    GoogleDrive,
    Pdf,
}

impl PdfSource {
    pub fn of_url(url: &str) -> Self {
        if url.contains("drive.google.com") {
            PdfSource::GoogleDrive
        } else {
            PdfSource::Pdf
        }
    }
}

/// A chapter with its link kind resolved, as returned by the API
#[derive(Debug, Clone, Serialize)]
pub struct ChapterView {
    #[serde(flatten)]
    pub chapter: Chapter,
    pub source: Option<PdfSource>,
}

impl From<Chapter> for ChapterView {
    fn from(chapter: Chapter) -> Self {
        let source = chapter.pdf_source();
        Self { chapter, source }
    }
}

/// Direction of a single-step reorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    /// Towards order_index 1
    Up,
    /// Towards order_index N
    Down,
}

impl fmt::Display for MoveDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveDirection::Up => write!(f, "up"),
            MoveDirection::Down => write!(f, "down"),
        }
    }
}

impl FromStr for MoveDirection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "up" => Ok(MoveDirection::Up),
            "down" => Ok(MoveDirection::Down),
            _ => Err(anyhow::anyhow!("Invalid move direction: {}", s)),
        }
    }
}

/// Exchange of two adjacent chapters' positions.
///
/// The indexes are the values that were read; the repository only applies
/// the swap if both rows still hold them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderSwap {
    pub book_id: i64,
    pub moving_id: i64,
    pub moving_index: i32,
    pub neighbour_id: i64,
    pub neighbour_index: i32,
}

impl OrderSwap {
    /// Apply the swap to an in-memory list
    pub fn apply(&self, chapters: &mut [Chapter]) {
        for chapter in chapters.iter_mut() {
            if chapter.id == self.moving_id {
                chapter.order_index = self.neighbour_index;
            } else if chapter.id == self.neighbour_id {
                chapter.order_index = self.moving_index;
            }
        }
        chapters.sort_by_key(|c| c.order_index);
    }
}

/// Outcome of planning a move
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MovePlan {
    /// No chapter with that id in the list
    NotFound,
    /// Already first (up) or last (down); nothing to write
    AtBoundary,
    Swap(OrderSwap),
    /// The adjacent position is missing, so the stored order is not dense
    Inconsistent,
}

/// Plan moving chapter `id` one step in `direction` within `chapters`,
/// which must all belong to the same book.
pub fn plan_move(chapters: &[Chapter], id: i64, direction: MoveDirection) -> MovePlan {
    let Some(moving) = chapters.iter().find(|c| c.id == id) else {
        return MovePlan::NotFound;
    };

    let last = chapters.len() as i32;
    let target = match direction {
        MoveDirection::Up if moving.order_index <= 1 => return MovePlan::AtBoundary,
        MoveDirection::Down if moving.order_index >= last => return MovePlan::AtBoundary,
        MoveDirection::Up => moving.order_index - 1,
        MoveDirection::Down => moving.order_index + 1,
    };

    match chapters
        .iter()
        .find(|c| c.order_index == target && c.id != moving.id)
    {
        Some(neighbour) => MovePlan::Swap(OrderSwap {
            book_id: moving.book_id,
            moving_id: moving.id,
            moving_index: moving.order_index,
            neighbour_id: neighbour.id,
            neighbour_index: neighbour.order_index,
        }),
        None => MovePlan::Inconsistent,
    }
}

/// Whether `indexes` are exactly `1..=N` in some order
pub fn is_dense_order(indexes: impl IntoIterator<Item = i32>) -> bool {
    let mut sorted: Vec<i32> = indexes.into_iter().collect();
    sorted.sort_unstable();
    sorted
        .iter()
        .enumerate()
        .all(|(i, &index)| index == i as i32 + 1)
}

/// New positions that make `chapters` dense while keeping their current
/// relative order (ties broken by chapter number, then id).
pub fn dense_renumbering(chapters: &[Chapter]) -> Vec<(i64, i32)> {
    let mut ordered: Vec<&Chapter> = chapters.iter().collect();
    ordered.sort_by_key(|c| (c.order_index, c.chapter_number, c.id));
    ordered
        .iter()
        .enumerate()
        .map(|(i, c)| (c.id, i as i32 + 1))
        .collect()
}

/// Minimal reference to a neighbouring chapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterRef {
    pub id: i64,
    pub title: String,
    pub chapter_number: i32,
}

impl From<&Chapter> for ChapterRef {
    fn from(chapter: &Chapter) -> Self {
        Self {
            id: chapter.id,
            title: chapter.title.clone(),
            chapter_number: chapter.chapter_number,
        }
    }
}

/// Previous/next links for the reading view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterNavigation {
    pub previous: Option<ChapterRef>,
    pub next: Option<ChapterRef>,
    /// 1-based position in reading order
    pub position: usize,
    pub total: usize,
}

/// Navigation for chapter `id` within `chapters` (sorted or not)
pub fn navigation(chapters: &[Chapter], id: i64) -> Option<ChapterNavigation> {
    let mut ordered: Vec<&Chapter> = chapters.iter().collect();
    ordered.sort_by_key(|c| c.order_index);
    let pos = ordered.iter().position(|c| c.id == id)?;

    Some(ChapterNavigation {
        previous: pos
            .checked_sub(1)
            .and_then(|i| ordered.get(i))
            .map(|c| ChapterRef::from(*c)),
        next: ordered.get(pos + 1).map(|c| ChapterRef::from(*c)),
        position: pos + 1,
        total: ordered.len(),
    })
}

#[cfg(test)]
pub(crate) fn chapter_fixture(id: i64, book_id: i64, order_index: i32) -> Chapter {
    let now = Utc::now();
    Chapter {
        id,
        book_id,
        title: format!("Chapter {}", id),
        chapter_number: order_index,
        order_index,
        cover_url: None,
        pdf_url: None,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abc() -> Vec<Chapter> {
        vec![
            chapter_fixture(10, 1, 1),
            chapter_fixture(20, 1, 2),
            chapter_fixture(30, 1, 3),
        ]
    }

    fn ids_in_order(chapters: &[Chapter]) -> Vec<i64> {
        let mut sorted = chapters.to_vec();
        sorted.sort_by_key(|c| c.order_index);
        sorted.iter().map(|c| c.id).collect()
    }

    #[test]
    fn test_move_middle_up_swaps_with_first() {
        let mut chapters = abc();
        let MovePlan::Swap(swap) = plan_move(&chapters, 20, MoveDirection::Up) else {
            panic!("expected swap");
        };
        assert_eq!(swap.neighbour_id, 10);
        assert_eq!((swap.moving_index, swap.neighbour_index), (2, 1));

        swap.apply(&mut chapters);
        assert_eq!(ids_in_order(&chapters), vec![20, 10, 30]);
        assert!(is_dense_order(chapters.iter().map(|c| c.order_index)));
    }

    #[test]
    fn test_move_first_up_is_boundary() {
        assert_eq!(plan_move(&abc(), 10, MoveDirection::Up), MovePlan::AtBoundary);
    }

    #[test]
    fn test_move_last_down_is_boundary() {
        assert_eq!(plan_move(&abc(), 30, MoveDirection::Down), MovePlan::AtBoundary);
    }

    #[test]
    fn test_move_unknown_chapter() {
        assert_eq!(plan_move(&abc(), 99, MoveDirection::Down), MovePlan::NotFound);
    }

    #[test]
    fn test_move_with_gap_is_inconsistent() {
        let chapters = vec![chapter_fixture(1, 1, 1), chapter_fixture(2, 1, 3), chapter_fixture(3, 1, 4)];
        assert_eq!(plan_move(&chapters, 2, MoveDirection::Up), MovePlan::Inconsistent);
    }

    #[test]
    fn test_single_chapter_cannot_move() {
        let chapters = vec![chapter_fixture(1, 1, 1)];
        assert_eq!(plan_move(&chapters, 1, MoveDirection::Up), MovePlan::AtBoundary);
        assert_eq!(plan_move(&chapters, 1, MoveDirection::Down), MovePlan::AtBoundary);
    }

    #[test]
    fn test_is_dense_order() {
        assert!(is_dense_order(Vec::<i32>::new()));
        assert!(is_dense_order([2, 1, 3]));
        assert!(!is_dense_order([1, 3]));
        assert!(!is_dense_order([1, 1, 2]));
        assert!(!is_dense_order([0, 1]));
    }

    #[test]
    fn test_dense_renumbering_closes_gaps_and_keeps_order() {
        let chapters = vec![chapter_fixture(5, 1, 7), chapter_fixture(6, 1, 2), chapter_fixture(7, 1, 4)];
        assert_eq!(dense_renumbering(&chapters), vec![(6, 1), (7, 2), (5, 3)]);
    }

    #[test]
    fn test_navigation_links() {
        let chapters = abc();
        let nav = navigation(&chapters, 20).unwrap();
        assert_eq!(nav.previous.unwrap().id, 10);
        assert_eq!(nav.next.unwrap().id, 30);
        assert_eq!((nav.position, nav.total), (2, 3));

        let first = navigation(&chapters, 10).unwrap();
        assert!(first.previous.is_none());
        let last = navigation(&chapters, 30).unwrap();
        assert!(last.next.is_none());
        assert!(navigation(&chapters, 99).is_none());
    }

    #[test]
    fn test_pdf_source_detection() {
        assert_eq!(
            PdfSource::of_url("https://drive.google.com/file/d/abc/view"),
            PdfSource::GoogleDrive
        );
        assert_eq!(PdfSource::of_url("/api/v1/storage/book_pdfs/x.pdf"), PdfSource::Pdf);
    }

    #[test]
    fn test_pdf_url_falls_back_to_drive_link() {
        let chapter = Chapter::new(
            1,
            ChapterInput {
                title: "Opening".to_string(),
                chapter_number: 1,
                pdf_url: Some("".to_string()),
                google_drive_link: Some("https://drive.google.com/file/d/x".to_string()),
                ..ChapterInput::default()
            },
        );
        assert_eq!(chapter.pdf_source(), Some(PdfSource::GoogleDrive));
    }
}
