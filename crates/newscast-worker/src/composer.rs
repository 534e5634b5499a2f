//! Script composers.
//!
//! A composer turns the selected articles into a [`NarrationPlan`]. What to
//! say is the composer's business; the pipeline only validates the plan.

use async_trait::async_trait;

use newscast_models::{Article, NarrationPlan, NarrationSegment};

use crate::error::{PipelineError, PipelineResult};

/// Produces the narration plan for a run.
#[async_trait]
pub trait ScriptComposer: Send + Sync {
    async fn compose(&self, articles: &[Article]) -> PipelineResult<NarrationPlan>;
}

/// Spoken length of `text` at `chars_per_second`.
pub fn estimate_duration(text: &str, chars_per_second: f64) -> f64 {
    if chars_per_second <= 0.0 {
        return 0.0;
    }
    text.chars().count() as f64 / chars_per_second
}

/// Deterministic intro / one segment per article / outro.
///
/// `{count}` in the intro is replaced with the number of articles.
#[derive(Debug, Clone)]
pub struct TemplateComposer {
    pub intro: String,
    pub outro: String,
    pub chars_per_second: f64,
}

impl Default for TemplateComposer {
    fn default() -> Self {
        Self {
            intro: "Hello and welcome. Here are today's {count} top stories.".to_string(),
            outro: "Thank you for watching. See you in the next bulletin.".to_string(),
            chars_per_second: 13.0,
        }
    }
}

impl TemplateComposer {
    pub fn new(chars_per_second: f64) -> Self {
        Self {
            chars_per_second,
            ..Default::default()
        }
    }

    fn timed(&self, segment: NarrationSegment) -> NarrationSegment {
        let secs = estimate_duration(&segment.text, self.chars_per_second);
        segment.with_target_duration(secs)
    }
}

#[async_trait]
impl ScriptComposer for TemplateComposer {
    async fn compose(&self, articles: &[Article]) -> PipelineResult<NarrationPlan> {
        if articles.is_empty() {
            return Err(PipelineError::planning("no articles to narrate"));
        }

        let mut segments = Vec::with_capacity(articles.len() + 2);
        let intro = self.intro.replace("{count}", &articles.len().to_string());
        if !intro.trim().is_empty() {
            segments.push(self.timed(NarrationSegment::intro(intro)));
        }
        for (index, article) in articles.iter().enumerate() {
            segments.push(self.timed(NarrationSegment::item(index, &article.title, article.narration_text())));
        }
        if !self.outro.trim().is_empty() {
            segments.push(self.timed(NarrationSegment::outro(&self.outro)));
        }

        let plan = NarrationPlan::new(segments);
        plan.validate().map_err(|e| PipelineError::planning(e.to_string()))?;
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use newscast_models::{ArticleId, SegmentKind};

    fn article(id: i64, title: &str, summary: &str) -> Article {
        Article {
            id: ArticleId(id),
            source: "wire".to_string(),
            title: title.to_string(),
            url: format!("https://n.example/{}", id),
            summary: summary.to_string(),
            body: String::new(),
            image_url: None,
            published_at: None,
            crawled_at: Utc::now(),
            category: None,
            selected: true,
            used_in_production: None,
        }
    }

    #[test]
    fn test_estimate_duration() {
        assert_eq!(estimate_duration(&"a".repeat(130), 13.0), 10.0);
        assert_eq!(estimate_duration("abc", 0.0), 0.0);
    }

    #[tokio::test]
    async fn test_template_plan_shape() {
        let composer = TemplateComposer::default();
        let articles = vec![article(1, "Storm", "Heavy rain"), article(2, "Markets", "Stocks up")];

        let plan = composer.compose(&articles).await.unwrap();

        assert_eq!(plan.segments.len(), 4);
        assert_eq!(plan.segments[0].kind, SegmentKind::Intro);
        assert!(plan.segments[0].text.contains("2 top stories"));
        assert_eq!(plan.segments[1].text, "Storm. Heavy rain");
        assert_eq!(plan.segments[2].item_index, Some(1));
        assert_eq!(plan.segments[3].kind, SegmentKind::Outro);
        assert!(plan.segments.iter().all(|s| s.target_duration_secs.is_some()));
    }

    #[tokio::test]
    async fn test_empty_selection_is_planning_error() {
        let err = TemplateComposer::default().compose(&[]).await.unwrap_err();
        assert!(matches!(err, PipelineError::Planning(_)));
    }
}
