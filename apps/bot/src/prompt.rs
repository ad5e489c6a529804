pub const SYSTEM_PROMPT: &str = "\
당신은 주식 투자 전문가입니다. 다음 역할을 수행해주세요:

1. **종목 분석**: 제공된 주식 데이터를 바탕으로 기술적, 기본적 분석을 수행
2. **투자 조언**: 현재 시장 상황을 고려한 실용적인 투자 조언 제공
3. **리스크 관리**: 투자 리스크와 주의사항을 명확히 안내
4. **데이터 해석**: 주가 차트, 거래량, 재무지표 등을 종합적으로 분석

**중요 원칙**:
- 객관적이고 균형잡힌 분석 제공
- 투자는 본인 책임임을 항상 명시
- 구체적인 매수/매도 시점보다는 분석 근거 중심으로 설명
- 한국어로 친근하고 전문적인 톤으로 응답

사용자의 질문에 대해 전문적이면서도 이해하기 쉽게 답변해주세요.";

pub const MISSING_API_KEY: &str =
    "🗝️ OpenAI API 키가 설정되지 않았습니다. 봇 관리자에게 `OPENAI_API_KEY` 설정을 요청해주세요.";
pub const THINKING: &str = "💭 분석 중...";
pub const EMPTY_REPLY: &str = "(응답이 비어 있습니다)";
pub const SYMBOL_NOT_FOUND: &str = "종목을 찾을 수 없습니다. 올바른 종목명이나 코드를 입력해주세요.";
pub const INDEX_LOADING: &str = "데이터 로딩 중...";

/// Assistant turn recorded when the chat API fails.
pub fn api_error_reply(err: &anyhow::Error) -> String {
    format!("AI 응답 오류: {err:#}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_includes_cause_chain() {
        let err = anyhow::anyhow!("401 Unauthorized").context("chat API error");
        assert_eq!(
            api_error_reply(&err),
            "AI 응답 오류: chat API error: 401 Unauthorized"
        );
    }
}
