//! Prompt templates for each model call in the research pipeline:
//! - system: shared researcher persona, stamped with today's date
//! - feedback: clarifying questions about the user's topic
//! - serp_queries: planning sub-queries for a topic
//! - distill: learnings and follow-ups from search contents
//! - final_report: the closing markdown report

use chrono::Utc;

/// Prompt templates for the research pipeline
pub struct ResearchPrompts;

impl ResearchPrompts {
    fn current_date() -> String {
        Utc::now().format("%Y-%m-%d").to_string()
    }

    /// Shared system prompt for every generator call
    pub fn system() -> String {
        format!(
            r#"You are an expert researcher. Today is {date}. Follow these instructions when responding:
- You may be asked to research subjects that are after your knowledge cutoff; assume the user is right when presented with news.
- The user is a highly experienced analyst, no need to simplify it, be as detailed as possible and make sure your response is correct.
- Be highly organized.
- Suggest solutions that I didn't think about.
- Be proactive and anticipate my needs.
- Treat me as an expert in all subject matter.
- Mistakes erode my trust, so be accurate and thorough.
- Provide detailed explanations, I'm comfortable with lots of detail.
- Value good arguments over authorities, the source is irrelevant.
- Consider new technologies and contrarian ideas, not just the conventional wisdom.
- You may use high levels of speculation or prediction, just flag it for me.
- Always respond with valid JSON when a JSON object is requested."#,
            date = Self::current_date()
        )
    }

    pub fn feedback(topic: &str, max_questions: usize) -> String {
        format!(
            "Given this research topic: {topic}, generate up to {max_questions} follow-up questions to \
             better understand the user's research needs. Return the response as a JSON object with a \
             'questions' array field."
        )
    }

    pub fn serp_queries(topic: &str, max_queries: usize, prior_learnings: &[String]) -> String {
        let mut prompt = format!(
            "Given the following prompt from the user, generate a list of SERP queries to research the topic. \
             Return a JSON object with a 'queries' array field containing {max_queries} queries (or less if \
             the original prompt is clear). Each query object should have 'query' and 'research_goal' \
             fields. Make sure each query is unique and not similar to each other: <prompt>{topic}</prompt>"
        );
        if !prior_learnings.is_empty() {
            prompt.push_str(
                "\n\nHere are some learnings from previous research, use them to generate more specific queries: ",
            );
            prompt.push_str(&prior_learnings.join(" "));
        }
        prompt
    }

    /// `contents` are already sliced to the per-document budget.
    pub fn distill(
        query: &str,
        contents: &[String],
        max_learnings: usize,
        max_follow_ups: usize,
    ) -> String {
        let contents: String = contents
            .iter()
            .map(|c| format!("<content>\n{c}\n</content>"))
            .collect();
        format!(
            "Given the following contents from a SERP search for the query <query>{query}</query>, \
             generate a list of learnings from the contents. Return a JSON object with 'learnings' and \
             'followUpQuestions' arrays. Include up to {max_learnings} learnings and {max_follow_ups} \
             follow-up questions. The learnings should be unique, concise, and information-dense, \
             including entities, metrics, numbers, and dates.\n\n<contents>{contents}</contents>"
        )
    }

    /// `learnings` is the already-sliced `<learning>` block.
    pub fn final_report(topic: &str, learnings: &str) -> String {
        format!(
            "Given the following prompt from the user, write a final report on the topic using the \
             learnings from research. Return a JSON object with a 'reportMarkdown' field containing a \
             detailed markdown report (aim for 3+ pages). Include ALL the learnings from research:\n\n\
             <prompt>{topic}</prompt>\n\n\
             Here are all the learnings from research:\n\n\
             <learnings>\n{learnings}\n</learnings>"
        )
    }
}
