//=====================================================================================================================
Game object (on-chain, module spot_game):

The keeper reads one shared object through sui_getObject (showContent, showOwner)

- round_number: u64                      // rendered as a decimal string
- current_round: Option<Round>           // null, or { fields: { vec: [Round] } } on older nodes
    - Round.end_time_ms: u64             // wall clock millis, compared against the keeper's clock
    - Round.bets: vector<Bet>


//=====================================================================================================================

Keeper:

The keeper (off-chain service) calls 1 method on the game package

// Close the expired round and open the next one
- entry fun trigger_new_round(game: &mut Game, output: vector<u8>, alpha: vector<u8>, proof: vector<u8>, clock: &Clock)
    - output, proof: from `ecvrf-cli prove --input <hex alpha> --secret-key <key>`
    - alpha: decimal millis at attempt time, as UTF-8 bytes
    - clock: 0x6

Submission: unsafe_moveCall -> sign intent(0,0,0) || txBytes with ed25519 -> sui_executeTransactionBlock
    (WaitForLocalExecution). effects.status == failure means the call was rejected.
